//! Fargate service behind an application load balancer
//!
//! The service is declared in two phases. [`FargateService::new`] declares
//! everything that only depends on upstream constructs. The task definition
//! needs `CODER_ACCESS_URL`, which comes from the CDN built afterwards, so it
//! is rendered by [`FargateService::finalize`] once
//! [`FargateService::set_access_url`] has been called.

use super::{Network, ProvisionerRole, SecurityGroup, assume_role_policy, name_tag};
use crate::error::{Result, StackError};
use crate::health::HealthCheck;
use crate::model::{ServiceConfig, SubnetType};
use coderstack_cloud::{Deferred, DeletionPolicy, Stack, Token};
use serde_json::json;
use std::collections::BTreeMap;

pub const ENV_PG_CONNECTION_URL: &str = "CODER_PG_CONNECTION_URL";
pub const ENV_DISABLE_PASSWORD_AUTH: &str = "CODER_DISABLE_PASSWORD_AUTH";
pub const ENV_HTTP_ADDRESS: &str = "CODER_HTTP_ADDRESS";
pub const ENV_PROXY_TRUSTED_HEADERS: &str = "CODER_PROXY_TRUSTED_HEADERS";
pub const ENV_DERP_CONFIG_URL: &str = "CODER_DERP_CONFIG_URL";
pub const ENV_PROVISIONER_DAEMONS: &str = "CODER_PROVISIONER_DAEMONS";
pub const ENV_ACCESS_URL: &str = "CODER_ACCESS_URL";

/// Variables the stack sets itself
pub const MANAGED_ENVIRONMENT: [&str; 7] = [
    ENV_PG_CONNECTION_URL,
    ENV_DISABLE_PASSWORD_AUTH,
    ENV_HTTP_ADDRESS,
    ENV_PROXY_TRUSTED_HEADERS,
    ENV_DERP_CONFIG_URL,
    ENV_PROVISIONER_DAEMONS,
    ENV_ACCESS_URL,
];

const LISTENER_PORT: u16 = 80;
const HEALTH_CHECK_GRACE_PERIOD_SECONDS: u32 = 60;

/// Declare an empty ECS cluster
pub fn ecs_cluster(stack: &mut Stack, id: &str) -> Result<Token> {
    stack.add_resource(id, "AWS::ECS::Cluster", json!({}))?;
    Ok(Token::reference(id))
}

/// The application load balancer in front of the service
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    pub logical_id: String,
    pub dns_name: Token,
}

/// Inputs for [`FargateService::new`]
pub struct FargateServiceProps<'a> {
    pub config: &'a ServiceConfig,
    pub network: &'a Network,
    pub cluster: Token,
    pub security_group: &'a SecurityGroup,
    /// Database connection URL for `CODER_PG_CONNECTION_URL`
    pub connection_url: Token,
    pub task_role: &'a ProvisionerRole,
}

/// A declared service whose task definition is still pending
#[derive(Debug)]
pub struct FargateService {
    id: String,
    config: ServiceConfig,
    task_role_arn: Token,
    environment: BTreeMap<String, Token>,
    access_url: Deferred<Token>,
    load_balancer: LoadBalancer,
}

impl FargateService {
    pub fn new(stack: &mut Stack, id: &str, props: FargateServiceProps<'_>) -> Result<Self> {
        let config = props.config;
        config.validate_task_size()?;
        config.health_check.validate()?;
        let environment = managed_environment(config, props.connection_url)?;

        let public = props.network.subnet_ids(SubnetType::Public);
        if public.is_empty() {
            return Err(StackError::InvalidNetwork(
                "the load balancer needs at least one public subnet".to_string(),
            ));
        }
        let service_subnets = if config.assign_public_ip {
            public.clone()
        } else {
            props.network.subnet_ids(SubnetType::PrivateWithEgress)
        };
        if service_subnets.is_empty() {
            return Err(StackError::InvalidNetwork(
                "tasks without a public IP need at least one private subnet".to_string(),
            ));
        }
        let path = format!("{}/{}", stack.name(), id);

        let log_group_id = format!("{}LogGroup", id);
        stack
            .add_resource(&log_group_id, "AWS::Logs::LogGroup", json!({}))?
            .set_deletion_policy(DeletionPolicy::Retain);

        let execution_role_id = format!("{}ExecutionRole", id);
        stack.add_resource(
            &execution_role_id,
            "AWS::IAM::Role",
            json!({ "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com") }),
        )?;
        stack.add_resource(
            format!("{}ExecutionRolePolicy", id),
            "AWS::IAM::Policy",
            json!({
                "PolicyName": format!("{}ExecutionRolePolicy", id),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                        "Resource": Token::attribute(&log_group_id, "Arn"),
                    }],
                },
                "Roles": [Token::reference(&execution_role_id)],
            }),
        )?;

        // Load balancer, open to the internet on the listener port
        let lb_security_group = SecurityGroup::new(
            stack,
            &format!("{}LoadBalancerSecurityGroup", id),
            props.network,
            &format!("{} load balancer", path),
        )?;
        lb_security_group.allow_from_anywhere(
            stack,
            LISTENER_PORT,
            props.network.dual_stack(),
            "Allow from anyone on port 80",
        )?;
        props.security_group.allow_from(
            stack,
            &lb_security_group,
            config.container_port,
            "Load balancer to target",
        )?;

        let lb_id = format!("{}LoadBalancer", id);
        let lb = stack.add_resource(
            &lb_id,
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            json!({
                "Type": "application",
                "Scheme": "internet-facing",
                "IpAddressType": if props.network.dual_stack() { "dualstack" } else { "ipv4" },
                "Subnets": public,
                "SecurityGroups": [lb_security_group.group_id()],
                "LoadBalancerAttributes": [
                    { "Key": "deletion_protection.enabled", "Value": "false" },
                ],
                "Tags": name_tag(&path),
            }),
        )?;
        for route in props.network.internet_routes() {
            lb.add_dependency(route);
        }

        let target_group_id = format!("{}TargetGroup", id);
        stack.add_resource(
            &target_group_id,
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            target_group_properties(&config.health_check, props.network),
        )?;

        let listener_id = format!("{}Listener", id);
        stack.add_resource(
            &listener_id,
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "LoadBalancerArn": Token::reference(&lb_id),
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
                "DefaultActions": [{
                    "Type": "forward",
                    "TargetGroupArn": Token::reference(&target_group_id),
                }],
            }),
        )?;

        stack
            .add_resource(
                format!("{}Service", id),
                "AWS::ECS::Service",
                json!({
                    "Cluster": props.cluster,
                    "TaskDefinition": Token::reference(task_definition_id(id)),
                    "DesiredCount": config.desired_count,
                    "LaunchType": "FARGATE",
                    "HealthCheckGracePeriodSeconds": HEALTH_CHECK_GRACE_PERIOD_SECONDS,
                    "DeploymentConfiguration": {
                        "MaximumPercent": 200,
                        "MinimumHealthyPercent": 50,
                    },
                    "EnableECSManagedTags": false,
                    "NetworkConfiguration": {
                        "AwsvpcConfiguration": {
                            "AssignPublicIp": if config.assign_public_ip { "ENABLED" } else { "DISABLED" },
                            "SecurityGroups": [props.security_group.group_id()],
                            "Subnets": service_subnets,
                        },
                    },
                    "LoadBalancers": [{
                        "ContainerName": config.container_name,
                        "ContainerPort": config.container_port,
                        "TargetGroupArn": Token::reference(&target_group_id),
                    }],
                }),
            )?
            .add_dependency(&listener_id);

        tracing::info!(
            service = %id,
            image = %config.image,
            cpu = config.cpu,
            memory = config.memory_mib,
            "Declared Fargate service (task definition pending)"
        );

        Ok(Self {
            id: id.to_string(),
            config: config.clone(),
            task_role_arn: props.task_role.arn(),
            environment,
            access_url: Deferred::new(ENV_ACCESS_URL),
            load_balancer: LoadBalancer {
                logical_id: lb_id.clone(),
                dns_name: Token::attribute(&lb_id, "DNSName"),
            },
        })
    }

    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.load_balancer
    }

    pub fn health_check(&self) -> &HealthCheck {
        &self.config.health_check
    }

    pub fn task_role_arn(&self) -> &Token {
        &self.task_role_arn
    }

    /// Patch in the externally reachable URL; may only be done once
    pub fn set_access_url(&mut self, url: Token) -> Result<()> {
        self.access_url.resolve(url)?;
        Ok(())
    }

    pub fn has_access_url(&self) -> bool {
        self.access_url.is_resolved()
    }

    /// Complete container environment.
    ///
    /// Fails with `UnresolvedReference` until the access URL is set.
    pub fn environment(&self) -> Result<BTreeMap<String, Token>> {
        let access_url = self.access_url.get(&task_definition_id(&self.id))?;
        let mut environment = self.environment.clone();
        environment.insert(ENV_ACCESS_URL.to_string(), access_url.clone());
        Ok(environment)
    }

    /// Render the task definition and return the final environment
    pub fn finalize(self, stack: &mut Stack) -> Result<BTreeMap<String, Token>> {
        let environment = self.environment()?;
        let config = &self.config;
        let task_definition_id = task_definition_id(&self.id);
        let family = format!("{}{}", stack.name(), self.id);

        let variables: Vec<_> = environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();

        stack.add_resource(
            &task_definition_id,
            "AWS::ECS::TaskDefinition",
            json!({
                "Family": family,
                "Cpu": config.cpu.to_string(),
                "Memory": config.memory_mib.to_string(),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "RuntimePlatform": {
                    "CpuArchitecture": config.cpu_architecture.as_str(),
                    "OperatingSystemFamily": "LINUX",
                },
                "ExecutionRoleArn": Token::attribute(format!("{}ExecutionRole", self.id), "Arn"),
                "TaskRoleArn": self.task_role_arn,
                "ContainerDefinitions": [{
                    "Name": config.container_name,
                    "Image": config.image,
                    "Essential": true,
                    "PortMappings": [{
                        "ContainerPort": config.container_port,
                        "Protocol": "tcp",
                    }],
                    "Environment": variables,
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": Token::reference(format!("{}LogGroup", self.id)),
                            "awslogs-stream-prefix": self.id,
                            "awslogs-region": Token::region(),
                        },
                    },
                }],
            }),
        )?;

        tracing::info!(
            task_definition = %task_definition_id,
            variables = environment.len(),
            "Rendered task definition"
        );
        Ok(environment)
    }
}

fn task_definition_id(service_id: &str) -> String {
    format!("{}TaskDefinition", service_id)
}

/// Managed variables (all but the access URL) plus user extras
fn managed_environment(
    config: &ServiceConfig,
    connection_url: Token,
) -> Result<BTreeMap<String, Token>> {
    let mut environment = BTreeMap::new();
    environment.insert(ENV_PG_CONNECTION_URL.to_string(), connection_url);
    environment.insert(
        ENV_DISABLE_PASSWORD_AUTH.to_string(),
        Token::literal(config.disable_password_auth.to_string()),
    );
    environment.insert(
        ENV_HTTP_ADDRESS.to_string(),
        Token::literal(format!("0.0.0.0:{}", config.container_port)),
    );
    environment.insert(
        ENV_PROXY_TRUSTED_HEADERS.to_string(),
        Token::literal(&config.trusted_proxy_header),
    );
    environment.insert(
        ENV_DERP_CONFIG_URL.to_string(),
        Token::literal(&config.derp_config_url),
    );
    environment.insert(
        ENV_PROVISIONER_DAEMONS.to_string(),
        Token::literal(config.provisioner_daemons.to_string()),
    );

    for (name, value) in &config.extra_environment {
        if MANAGED_ENVIRONMENT.contains(&name.as_str()) {
            return Err(StackError::ReservedEnvironment(name.clone()));
        }
        environment.insert(name.clone(), Token::literal(value));
    }
    Ok(environment)
}

fn target_group_properties(check: &HealthCheck, network: &Network) -> serde_json::Value {
    json!({
        "Port": LISTENER_PORT,
        "Protocol": "HTTP",
        "TargetType": "ip",
        "IpAddressType": "ipv4",
        "VpcId": network.vpc_id(),
        "HealthCheckEnabled": true,
        "HealthCheckPath": check.path,
        "HealthCheckIntervalSeconds": check.interval.as_secs(),
        "HealthCheckTimeoutSeconds": check.timeout.as_secs(),
        "HealthyThresholdCount": check.healthy_threshold,
        "UnhealthyThresholdCount": check.unhealthy_threshold,
        "Matcher": { "HttpCode": check.healthy_http_codes },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NetworkConfig, ProvisionerConfig, SubnetTier};
    use coderstack_cloud::{CloudError, StackEnv};

    struct Fixture {
        stack: Stack,
        network: Network,
        security_group: SecurityGroup,
        role: ProvisionerRole,
    }

    fn fixture() -> Fixture {
        let mut stack = Stack::new("Test", StackEnv::default()).unwrap();
        let network = Network::new(&mut stack, "Vpc", &NetworkConfig::default()).unwrap();
        let security_group =
            SecurityGroup::new(&mut stack, "CoderSecurityGroup", &network, "coderd").unwrap();
        let role =
            ProvisionerRole::new(&mut stack, "ProvisionerRole", &ProvisionerConfig::default())
                .unwrap();
        Fixture {
            stack,
            network,
            security_group,
            role,
        }
    }

    fn service(f: &mut Fixture, config: &ServiceConfig) -> Result<FargateService> {
        let cluster = ecs_cluster(&mut f.stack, "Cluster").unwrap();
        FargateService::new(
            &mut f.stack,
            "Coder",
            FargateServiceProps {
                config,
                network: &f.network,
                cluster,
                security_group: &f.security_group,
                connection_url: Token::literal("postgresql://db"),
                task_role: &f.role,
            },
        )
    }

    #[test]
    fn test_environment_waits_for_access_url() {
        let mut f = fixture();
        let mut service = service(&mut f, &ServiceConfig::default()).unwrap();

        assert!(!service.has_access_url());
        assert!(matches!(
            service.environment(),
            Err(StackError::Cloud(CloudError::UnresolvedReference { .. }))
        ));

        service
            .set_access_url(Token::literal("https://d111.cloudfront.net"))
            .unwrap();
        let environment = service.environment().unwrap();
        assert_eq!(
            environment[ENV_ACCESS_URL],
            Token::literal("https://d111.cloudfront.net")
        );
        assert_eq!(environment[ENV_HTTP_ADDRESS], Token::literal("0.0.0.0:8080"));
        assert_eq!(environment[ENV_PROVISIONER_DAEMONS], Token::literal("3"));
        assert_eq!(environment[ENV_DISABLE_PASSWORD_AUTH], Token::literal("true"));

        assert!(matches!(
            service.set_access_url(Token::literal("https://other")),
            Err(StackError::Cloud(CloudError::AlreadyResolved(_)))
        ));
    }

    #[test]
    fn test_finalize_without_access_url_fails() {
        let mut f = fixture();
        let service = service(&mut f, &ServiceConfig::default()).unwrap();

        assert!(service.finalize(&mut f.stack).is_err());
        assert!(matches!(
            f.stack.synth(),
            Err(CloudError::UnresolvedReference { ref target, .. }) if target == "CoderTaskDefinition"
        ));
    }

    #[test]
    fn test_finalize_renders_task_definition() {
        let mut f = fixture();
        let mut service = service(&mut f, &ServiceConfig::default()).unwrap();
        service
            .set_access_url(Token::literal("https://d111.cloudfront.net"))
            .unwrap();
        service.finalize(&mut f.stack).unwrap();

        let template = f.stack.synth().unwrap();
        let task = &template.resources["CoderTaskDefinition"]["Properties"];
        assert_eq!(task["Cpu"], "2048");
        assert_eq!(task["Memory"], "4096");
        assert_eq!(task["RuntimePlatform"]["CpuArchitecture"], "ARM64");
        assert_eq!(
            task["TaskRoleArn"],
            json!({ "Fn::GetAtt": ["ProvisionerRole", "Arn"] })
        );

        let container = &task["ContainerDefinitions"][0];
        assert_eq!(container["Image"], "ghcr.io/coder/coder:v2.21.3");
        let names: Vec<&str> = container["Environment"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v["Name"].as_str())
            .collect();
        for name in MANAGED_ENVIRONMENT {
            assert!(names.contains(&name), "missing {}", name);
        }

        let ecs = &template.resources["CoderService"];
        assert_eq!(ecs["DependsOn"], json!(["CoderListener"]));
        assert_eq!(
            ecs["Properties"]["NetworkConfiguration"]["AwsvpcConfiguration"]["AssignPublicIp"],
            "ENABLED"
        );
    }

    #[test]
    fn test_target_group_health_check() {
        let mut f = fixture();
        service(&mut f, &ServiceConfig::default()).unwrap();
        let template = f.stack.synth();
        // task definition is still pending
        assert!(template.is_err());

        let target_group = f.stack.resource("CoderTargetGroup").unwrap().properties();
        assert_eq!(target_group["TargetType"], "ip");
        assert_eq!(target_group["HealthCheckPath"], "/healthz");
        assert_eq!(target_group["HealthCheckIntervalSeconds"], 5);
        assert_eq!(target_group["HealthCheckTimeoutSeconds"], 3);
        assert_eq!(target_group["HealthyThresholdCount"], 3);
        assert_eq!(target_group["UnhealthyThresholdCount"], 2);
        assert_eq!(target_group["Matcher"]["HttpCode"], "200");
    }

    #[test]
    fn test_private_tasks_need_private_subnets() {
        let mut stack = Stack::new("Test", StackEnv::default()).unwrap();
        let public_only = NetworkConfig {
            tiers: vec![SubnetTier::public("Public", 24)],
            ..Default::default()
        };
        let network = Network::new(&mut stack, "Vpc", &public_only).unwrap();
        let security_group =
            SecurityGroup::new(&mut stack, "CoderSecurityGroup", &network, "coderd").unwrap();
        let role =
            ProvisionerRole::new(&mut stack, "ProvisionerRole", &ProvisionerConfig::default())
                .unwrap();
        let cluster = ecs_cluster(&mut stack, "Cluster").unwrap();
        let config = ServiceConfig {
            assign_public_ip: false,
            ..Default::default()
        };

        let result = FargateService::new(
            &mut stack,
            "Coder",
            FargateServiceProps {
                config: &config,
                network: &network,
                cluster,
                security_group: &security_group,
                connection_url: Token::literal("postgresql://db"),
                task_role: &role,
            },
        );
        assert!(matches!(result, Err(StackError::InvalidNetwork(_))));
    }

    #[test]
    fn test_reserved_environment() {
        let mut f = fixture();
        let mut config = ServiceConfig::default();
        config
            .extra_environment
            .insert(ENV_ACCESS_URL.to_string(), "https://example.com".to_string());

        assert!(matches!(
            service(&mut f, &config),
            Err(StackError::ReservedEnvironment(name)) if name == ENV_ACCESS_URL
        ));
    }

    #[test]
    fn test_extra_environment_is_passed_through() {
        let mut f = fixture();
        let mut config = ServiceConfig::default();
        config
            .extra_environment
            .insert("CODER_TELEMETRY_ENABLE".to_string(), "false".to_string());

        let mut service = service(&mut f, &config).unwrap();
        service.set_access_url(Token::literal("https://cdn")).unwrap();
        let environment = service.finalize(&mut f.stack).unwrap();
        assert_eq!(
            environment["CODER_TELEMETRY_ENABLE"],
            Token::literal("false")
        );
    }
}
