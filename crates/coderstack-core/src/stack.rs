//! Composition of the Coder deployment

use crate::construct::{
    Cdn, Database, FargateService, FargateServiceProps, Network, ProvisionerRole, SecurityGroup,
    ecs_cluster,
};
use crate::error::Result;
use crate::model::StackConfig;
use coderstack_cloud::{Plan, Stack, StackEnv, Template, Token};
use serde_json::json;
use std::collections::BTreeMap;

/// Metadata key recording that the provisioner role doubles as the task role
pub const SHARED_TASK_ROLE_METADATA: &str = "coderstack:SharedTaskRole";

/// The built stack plus handles to its constructs
#[derive(Debug)]
pub struct CoderStack {
    pub stack: Stack,
    pub network: Network,
    pub database: Database,
    pub provisioner: ProvisionerRole,
    pub cdn: Cdn,
    /// Final container environment of the coderd task
    pub environment: BTreeMap<String, Token>,
}

impl CoderStack {
    /// Declare every resource, wire the CDN URL back into the service and
    /// render the task definition.
    pub fn build(config: &StackConfig, env: StackEnv) -> Result<Self> {
        tracing::info!(stack = %config.name, env = %env.uri(), "Building stack");

        let mut stack = Stack::new(&config.name, env)?
            .with_description("Coder on AWS: VPC, Aurora PostgreSQL, Fargate and CloudFront");

        let network = Network::new(&mut stack, "Vpc", &config.network)?;
        let database = Database::new(&mut stack, "Database", &network, &config.database)?;
        let provisioner = ProvisionerRole::new(&mut stack, "ProvisionerRole", &config.provisioner)?;

        let cluster = ecs_cluster(&mut stack, "Cluster")?;
        let security_group = SecurityGroup::new(&mut stack, "CoderSecurityGroup", &network, "coderd")?;
        database.allow_default_port_from(&mut stack, &security_group)?;

        let mut service = FargateService::new(
            &mut stack,
            "Coder",
            FargateServiceProps {
                config: &config.service,
                network: &network,
                cluster,
                security_group: &security_group,
                connection_url: database.connection_url(),
                task_role: &provisioner,
            },
        )?;

        let cdn = Cdn::new(&mut stack, "Cdn", service.load_balancer(), &config.cdn)?;
        service.set_access_url(cdn.access_url())?;

        // The task runs with the provisioner's EC2 permissions
        tracing::warn!(
            role = %provisioner.logical_id(),
            "Provisioner role is also the coderd task role"
        );
        stack.add_metadata(
            SHARED_TASK_ROLE_METADATA,
            json!({
                "Role": provisioner.logical_id(),
                "Reason": "coderd runs the built-in provisioner daemons in-process",
            }),
        );

        let environment = service.finalize(&mut stack)?;

        Ok(Self {
            stack,
            network,
            database,
            provisioner,
            cdn,
            environment,
        })
    }

    pub fn synth(&self) -> Result<Template> {
        Ok(self.stack.synth()?)
    }

    pub fn plan(&self) -> Plan {
        Plan::from_stack(&self.stack)
    }
}
