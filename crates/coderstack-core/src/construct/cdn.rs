//! CloudFront distribution in front of the load balancer

use super::LoadBalancer;
use crate::error::{Result, StackError};
use crate::model::CdnConfig;
use coderstack_cloud::{Stack, Token};
use glob::Pattern;
use serde_json::{Value, json};

/// CloudFront limit on path pattern length
const MAX_PATH_PATTERN_LEN: usize = 255;

/// Forward every viewer header except `Host`
const ALL_VIEWER_EXCEPT_HOST_HEADER: &str = "b689b0a8-53d0-40ab-baf2-68738e2966ac";

/// Managed cache policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    CachingDisabled,
    CachingOptimized,
}

impl CachePolicy {
    pub fn id(&self) -> &'static str {
        match self {
            CachePolicy::CachingDisabled => "4135ea2d-6df8-44a3-9df3-4b5a84be39ad",
            CachePolicy::CachingOptimized => "658327ea-f89d-4fab-a63d-7e88639e58f6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedMethods {
    GetHead,
    All,
}

impl AllowedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::All => &["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerProtocolPolicy {
    AllowAll,
    RedirectToHttps,
    HttpsOnly,
}

impl ViewerProtocolPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerProtocolPolicy::AllowAll => "allow-all",
            ViewerProtocolPolicy::RedirectToHttps => "redirect-to-https",
            ViewerProtocolPolicy::HttpsOnly => "https-only",
        }
    }
}

/// How requests matching a path pattern are served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBehavior {
    /// `None` for the default behavior
    pub path_pattern: Option<String>,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: AllowedMethods,
    pub cache_policy: CachePolicy,
    pub compress: bool,
}

impl CacheBehavior {
    /// Dynamic traffic: HTTPS redirect, all methods, no caching
    fn dynamic() -> Self {
        Self {
            path_pattern: None,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            allowed_methods: AllowedMethods::All,
            cache_policy: CachePolicy::CachingDisabled,
            compress: false,
        }
    }

    /// Static content: cached, compressed, GET/HEAD only
    fn cached(pattern: &str) -> Self {
        Self {
            path_pattern: Some(pattern.to_string()),
            viewer_protocol_policy: ViewerProtocolPolicy::AllowAll,
            allowed_methods: AllowedMethods::GetHead,
            cache_policy: CachePolicy::CachingOptimized,
            compress: true,
        }
    }

    fn to_json(&self, origin_id: &str) -> Value {
        let mut behavior = json!({
            "TargetOriginId": origin_id,
            "ViewerProtocolPolicy": self.viewer_protocol_policy.as_str(),
            "AllowedMethods": self.allowed_methods.methods(),
            "CachedMethods": ["GET", "HEAD"],
            "CachePolicyId": self.cache_policy.id(),
            "OriginRequestPolicyId": ALL_VIEWER_EXCEPT_HOST_HEADER,
            "Compress": self.compress,
        });
        if let Some(pattern) = &self.path_pattern {
            behavior["PathPattern"] = json!(pattern);
        }
        behavior
    }
}

/// A declared distribution
#[derive(Debug, Clone)]
pub struct Cdn {
    logical_id: String,
    default_behavior: CacheBehavior,
    behaviors: Vec<(Pattern, CacheBehavior)>,
}

impl Cdn {
    pub fn new(stack: &mut Stack, id: &str, origin: &LoadBalancer, config: &CdnConfig) -> Result<Self> {
        let default_behavior = CacheBehavior::dynamic();
        let mut behaviors: Vec<(Pattern, CacheBehavior)> = Vec::new();
        for path in &config.cached_paths {
            let pattern = compile_pattern(path)?;
            if behaviors.iter().any(|(p, _)| p.as_str() == pattern.as_str()) {
                return Err(StackError::InvalidPathPattern {
                    pattern: path.clone(),
                    message: "duplicate path pattern".to_string(),
                });
            }
            behaviors.push((pattern, CacheBehavior::cached(path)));
        }
        // CloudFront takes the first matching behavior in list order
        behaviors.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.as_str().len()));

        let origin_id = format!("{}Origin1", id);
        let description = format!("{}/{}", stack.name(), id);
        stack.add_resource(
            id,
            "AWS::CloudFront::Distribution",
            json!({
                "DistributionConfig": {
                    "Enabled": true,
                    "Comment": description,
                    "PriceClass": config.price_class.as_str(),
                    "HttpVersion": "http2and3",
                    "IPV6Enabled": config.ipv6,
                    "Origins": [{
                        "Id": origin_id,
                        "DomainName": origin.dns_name,
                        "CustomOriginConfig": {
                            "OriginProtocolPolicy": "http-only",
                            "HTTPPort": 80,
                            "HTTPSPort": 443,
                            "OriginSSLProtocols": ["TLSv1.2"],
                        },
                    }],
                    "DefaultCacheBehavior": default_behavior.to_json(&origin_id),
                    "CacheBehaviors": behaviors
                        .iter()
                        .map(|(_, behavior)| behavior.to_json(&origin_id))
                        .collect::<Vec<_>>(),
                },
            }),
        )?;

        let cdn = Self {
            logical_id: id.to_string(),
            default_behavior,
            behaviors,
        };
        stack.add_output(
            "URL",
            cdn.access_url(),
            Some("Coder access URL".to_string()),
        )?;

        tracing::info!(
            distribution = %id,
            origin = %origin.logical_id,
            price_class = config.price_class.as_str(),
            behaviors = cdn.behaviors.len(),
            "Declared CDN"
        );
        Ok(cdn)
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn domain_name(&self) -> Token {
        Token::attribute(&self.logical_id, "DomainName")
    }

    /// `https://<distribution domain>`
    pub fn access_url(&self) -> Token {
        Token::join([Token::literal("https://"), self.domain_name()])
    }

    pub fn default_behavior(&self) -> &CacheBehavior {
        &self.default_behavior
    }

    /// Path-specific behaviors in evaluation order: longest pattern first,
    /// declaration order among patterns of equal length
    pub fn behaviors(&self) -> impl Iterator<Item = &CacheBehavior> {
        self.behaviors.iter().map(|(_, behavior)| behavior)
    }

    /// The behavior serving `path`: the longest matching pattern, else the default
    pub fn behavior_for(&self, path: &str) -> &CacheBehavior {
        let path = path.strip_prefix('/').unwrap_or(path);
        self.behaviors
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, behavior)| behavior)
            .unwrap_or(&self.default_behavior)
    }
}

fn compile_pattern(path: &str) -> Result<Pattern> {
    let invalid = |message: &str| StackError::InvalidPathPattern {
        pattern: path.to_string(),
        message: message.to_string(),
    };

    if path.is_empty() || path.len() > MAX_PATH_PATTERN_LEN {
        return Err(invalid("must be 1-255 characters"));
    }
    let normalized = path.strip_prefix('/').unwrap_or(path);
    if normalized == "*" {
        return Err(invalid("'*' is the default behavior"));
    }
    Pattern::new(normalized).map_err(|e| invalid(e.msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderstack_cloud::StackEnv;

    fn origin() -> LoadBalancer {
        LoadBalancer {
            logical_id: "CoderLoadBalancer".to_string(),
            dns_name: Token::attribute("CoderLoadBalancer", "DNSName"),
        }
    }

    fn cdn(config: &CdnConfig) -> (Stack, Result<Cdn>) {
        let mut stack = Stack::new("Test", StackEnv::default()).unwrap();
        stack
            .add_resource("CoderLoadBalancer", "AWS::ElasticLoadBalancingV2::LoadBalancer", json!({}))
            .unwrap();
        let cdn = Cdn::new(&mut stack, "Cdn", &origin(), config);
        (stack, cdn)
    }

    #[test]
    fn test_behavior_for() {
        let (_, cdn) = cdn(&CdnConfig::default());
        let cdn = cdn.unwrap();

        let asset = cdn.behavior_for("/assets/app.js");
        assert_eq!(asset.cache_policy, CachePolicy::CachingOptimized);
        assert!(asset.compress);
        assert_eq!(asset.allowed_methods, AllowedMethods::GetHead);

        let icon = cdn.behavior_for("icon/coder.svg");
        assert_eq!(icon.path_pattern.as_deref(), Some("icon/*"));

        let api = cdn.behavior_for("/api/v2/users");
        assert_eq!(api, cdn.default_behavior());
        assert_eq!(api.cache_policy, CachePolicy::CachingDisabled);
        assert_eq!(api.viewer_protocol_policy, ViewerProtocolPolicy::RedirectToHttps);
        assert_eq!(api.allowed_methods, AllowedMethods::All);
        assert!(!api.compress);

        // '*' spans '/'
        assert!(cdn.behavior_for("/assets/fonts/inter.woff2").compress);
    }

    #[test]
    fn test_longest_pattern_wins() {
        let config = CdnConfig {
            cached_paths: vec!["assets/*".to_string(), "assets/fonts/*".to_string()],
            ..Default::default()
        };
        let (_, cdn) = cdn(&config);
        let cdn = cdn.unwrap();

        assert_eq!(
            cdn.behavior_for("/assets/fonts/a.woff2").path_pattern.as_deref(),
            Some("assets/fonts/*")
        );
        assert_eq!(
            cdn.behavior_for("/assets/app.js").path_pattern.as_deref(),
            Some("assets/*")
        );
    }

    #[test]
    fn test_rendered_order_agrees_with_behavior_for() {
        let config = CdnConfig {
            cached_paths: vec![
                "assets/*".to_string(),
                "icon/*".to_string(),
                "assets/fonts/*".to_string(),
            ],
            ..Default::default()
        };
        let (stack, cdn) = cdn(&config);
        let cdn = cdn.unwrap();
        let template = stack.synth().unwrap();

        let rendered: Vec<String> = template.resources["Cdn"]["Properties"]["DistributionConfig"]
            ["CacheBehaviors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["PathPattern"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(rendered, vec!["assets/fonts/*", "assets/*", "icon/*"]);

        // first match in rendered order, as CloudFront evaluates it
        for path in ["/assets/fonts/a.woff2", "/assets/app.js", "/icon/coder.svg", "/api/v2"] {
            let normalized = path.trim_start_matches('/');
            let first_match = rendered
                .iter()
                .find(|p| Pattern::new(p).unwrap().matches(normalized))
                .map(String::as_str);
            assert_eq!(
                cdn.behavior_for(path).path_pattern.as_deref(),
                first_match,
                "{}",
                path
            );
        }
    }

    #[test]
    fn test_distribution_resource() {
        let (stack, cdn) = cdn(&CdnConfig::default());
        let cdn = cdn.unwrap();
        let template = stack.synth().unwrap();

        let config = &template.resources["Cdn"]["Properties"]["DistributionConfig"];
        assert_eq!(config["PriceClass"], "PriceClass_200");
        assert_eq!(config["HttpVersion"], "http2and3");
        assert_eq!(config["IPV6Enabled"], true);
        assert_eq!(
            config["Origins"][0]["CustomOriginConfig"]["OriginProtocolPolicy"],
            "http-only"
        );
        assert_eq!(
            config["Origins"][0]["DomainName"],
            json!({ "Fn::GetAtt": ["CoderLoadBalancer", "DNSName"] })
        );
        assert_eq!(
            config["DefaultCacheBehavior"]["CachePolicyId"],
            "4135ea2d-6df8-44a3-9df3-4b5a84be39ad"
        );
        assert_eq!(config["CacheBehaviors"][0]["PathPattern"], "assets/*");
        assert_eq!(
            config["CacheBehaviors"][1]["CachePolicyId"],
            "658327ea-f89d-4fab-a63d-7e88639e58f6"
        );

        assert_eq!(
            template.outputs["URL"]["Value"],
            json!({ "Fn::Join": ["", ["https://", { "Fn::GetAtt": ["Cdn", "DomainName"] }]] })
        );
        assert_eq!(cdn.access_url(), Token::join(["https://".into(), cdn.domain_name()]));
    }

    #[test]
    fn test_invalid_patterns() {
        for paths in [vec!["*"], vec!["assets/[", "icon/*"], vec!["icon/*", "/icon/*"]] {
            let config = CdnConfig {
                cached_paths: paths.into_iter().map(String::from).collect(),
                ..Default::default()
            };
            assert!(matches!(
                cdn(&config).1,
                Err(StackError::InvalidPathPattern { .. })
            ));
        }
    }
}
