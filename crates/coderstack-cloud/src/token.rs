//! CloudFormation value expressions
//!
//! A [`Token`] stands for a value that may only be known once the stack is
//! deployed (a `Ref`, an `Fn::GetAtt`, ...). Tokens serialize straight into
//! CloudFormation intrinsic-function JSON.

use crate::error::{CloudError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeSet, HashMap};

/// Prefix shared by all pseudo parameters (`AWS::Region`, `AWS::AccountId`, ...)
const PSEUDO_PREFIX: &str = "AWS::";

/// A CloudFormation value expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Plain string
    Literal(String),

    /// `{"Ref": logical_id}`
    Ref(String),

    /// `{"Fn::GetAtt": [logical_id, attribute]}`
    GetAtt {
        logical_id: String,
        attribute: String,
    },

    /// `{"Fn::Join": ["", parts]}`
    Join(Vec<Token>),

    /// `{"Fn::Select": [index, list]}`
    Select { index: usize, list: Box<Token> },

    /// `{"Fn::GetAZs": ""}`
    GetAzs,

    /// `{"Fn::Cidr": [block, count, mask_bits]}`
    Cidr {
        block: Box<Token>,
        count: u32,
        mask_bits: u32,
    },
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref(logical_id.into())
    }

    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// Deployment region pseudo parameter
    pub fn region() -> Self {
        Token::Ref(format!("{PSEUDO_PREFIX}Region"))
    }

    /// Deployment account pseudo parameter
    pub fn account_id() -> Self {
        Token::Ref(format!("{PSEUDO_PREFIX}AccountId"))
    }

    pub fn availability_zones() -> Self {
        Token::GetAzs
    }

    pub fn select(index: usize, list: Token) -> Self {
        Token::Select {
            index,
            list: Box::new(list),
        }
    }

    pub fn cidr(block: Token, count: u32, mask_bits: u32) -> Self {
        Token::Cidr {
            block: Box::new(block),
            count,
            mask_bits,
        }
    }

    /// Concatenate tokens.
    ///
    /// Nested joins are flattened and adjacent literals merged, so a join of
    /// literals only collapses back into a single literal.
    pub fn join(parts: impl IntoIterator<Item = Token>) -> Self {
        let mut flat: Vec<Token> = Vec::new();
        for part in parts {
            let pieces = match part {
                Token::Join(inner) => inner,
                other => vec![other],
            };
            for piece in pieces {
                if piece.as_literal().is_some_and(str::is_empty) {
                    continue;
                }
                if let (Some(Token::Literal(prev)), Token::Literal(s)) = (flat.last_mut(), &piece) {
                    prev.push_str(s);
                    continue;
                }
                flat.push(piece);
            }
        }

        match flat.len() {
            0 => Token::Literal(String::new()),
            1 => flat.remove(0),
            _ => Token::Join(flat),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Whether `other` appears in this token, either as the whole token or
    /// as one of its join parts
    pub fn contains(&self, other: &Token) -> bool {
        if self == other {
            return true;
        }
        match self {
            Token::Join(parts) => parts.iter().any(|p| p.contains(other)),
            Token::Select { list, .. } => list.contains(other),
            Token::Cidr { block, .. } => block.contains(other),
            _ => false,
        }
    }

    /// Logical IDs this token depends on (pseudo parameters excluded)
    pub fn references(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Token::Literal(_) | Token::GetAzs => {}
            Token::Ref(id) => {
                if !is_pseudo_parameter(id) {
                    out.insert(id);
                }
            }
            Token::GetAtt { logical_id, .. } => {
                out.insert(logical_id);
            }
            Token::Join(parts) => parts.iter().for_each(|p| p.collect_references(out)),
            Token::Select { list, .. } => list.collect_references(out),
            Token::Cidr { block, .. } => block.collect_references(out),
        }
    }

    /// Evaluate the token against known deploy-time values
    pub fn resolve(&self, values: &AttributeValues) -> Result<String> {
        match self {
            Token::Literal(s) => Ok(s.clone()),
            Token::Ref(id) => values.refs.get(id).cloned().ok_or_else(|| {
                CloudError::UnresolvedReference {
                    from: "token".to_string(),
                    target: id.clone(),
                }
            }),
            Token::GetAtt {
                logical_id,
                attribute,
            } => values
                .attributes
                .get(&(logical_id.clone(), attribute.clone()))
                .cloned()
                .ok_or_else(|| CloudError::UnresolvedReference {
                    from: "token".to_string(),
                    target: format!("{logical_id}.{attribute}"),
                }),
            Token::Join(parts) => parts.iter().map(|p| p.resolve(values)).collect(),
            Token::Select { .. } => Err(CloudError::Unresolvable("Fn::Select".to_string())),
            Token::GetAzs => Err(CloudError::Unresolvable("Fn::GetAZs".to_string())),
            Token::Cidr { .. } => Err(CloudError::Unresolvable("Fn::Cidr".to_string())),
        }
    }
}

pub fn is_pseudo_parameter(id: &str) -> bool {
    id.starts_with(PSEUDO_PREFIX)
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Literal(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Literal(value)
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Token::Literal(s) => serializer.serialize_str(s),
            Token::Ref(id) => intrinsic(serializer, "Ref", id),
            Token::GetAtt {
                logical_id,
                attribute,
            } => intrinsic(serializer, "Fn::GetAtt", &[logical_id, attribute]),
            Token::Join(parts) => intrinsic(serializer, "Fn::Join", &("", parts)),
            Token::Select { index, list } => {
                intrinsic(serializer, "Fn::Select", &(index, list.as_ref()))
            }
            Token::GetAzs => intrinsic(serializer, "Fn::GetAZs", ""),
            Token::Cidr {
                block,
                count,
                mask_bits,
            } => intrinsic(
                serializer,
                "Fn::Cidr",
                &(block.as_ref(), count, mask_bits.to_string()),
            ),
        }
    }
}

fn intrinsic<S, V>(serializer: S, name: &str, value: &V) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(name, value)?;
    map.end()
}

/// Deploy-time values used to evaluate tokens
#[derive(Debug, Clone, Default)]
pub struct AttributeValues {
    refs: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
}

impl AttributeValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ref(mut self, logical_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.refs.insert(logical_id.into(), value.into());
        self
    }

    pub fn with_attribute(
        mut self,
        logical_id: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes
            .insert((logical_id.into(), attribute.into()), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_merges_literals() {
        let token = Token::join([
            Token::literal("https://"),
            Token::literal("example"),
            Token::literal(".com"),
        ]);
        assert_eq!(token, Token::literal("https://example.com"));
    }

    #[test]
    fn test_join_flattens_nested() {
        let inner = Token::join([
            Token::attribute("Db", "Endpoint.Address"),
            Token::literal(":"),
        ]);
        let token = Token::join([Token::literal("pg://"), inner, Token::literal("5432")]);

        match &token {
            Token::Join(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[2], Token::literal(":5432"));
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_serialize_intrinsics() {
        let token = Token::join([
            Token::literal("https://"),
            Token::attribute("Distribution", "DomainName"),
        ]);
        assert_eq!(
            serde_json::to_value(&token).unwrap(),
            json!({"Fn::Join": ["", ["https://", {"Fn::GetAtt": ["Distribution", "DomainName"]}]]})
        );

        let subnet_az = Token::select(1, Token::availability_zones());
        assert_eq!(
            serde_json::to_value(&subnet_az).unwrap(),
            json!({"Fn::Select": [1, {"Fn::GetAZs": ""}]})
        );

        let cidr = Token::cidr(Token::attribute("Vpc", "Ipv6CidrBlock"), 6, 64);
        assert_eq!(
            serde_json::to_value(&cidr).unwrap(),
            json!({"Fn::Cidr": [{"Fn::GetAtt": ["Vpc", "Ipv6CidrBlock"]}, 6, "64"]})
        );
    }

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let token = Token::join([
            Token::region(),
            Token::reference("Vpc"),
            Token::attribute("Cluster", "Arn"),
        ]);
        let refs: Vec<&str> = token.references().into_iter().collect();
        assert_eq!(refs, vec!["Cluster", "Vpc"]);
    }

    #[test]
    fn test_resolve() {
        let token = Token::join([
            Token::literal("https://"),
            Token::attribute("Distribution", "DomainName"),
        ]);
        let values = AttributeValues::new().with_attribute(
            "Distribution",
            "DomainName",
            "d111111abcdef8.cloudfront.net",
        );
        assert_eq!(
            token.resolve(&values).unwrap(),
            "https://d111111abcdef8.cloudfront.net"
        );
    }

    #[test]
    fn test_resolve_unknown_reference_fails() {
        let token = Token::reference("Missing");
        let result = token.resolve(&AttributeValues::new());
        assert!(matches!(
            result,
            Err(CloudError::UnresolvedReference { target, .. }) if target == "Missing"
        ));
    }

    #[test]
    fn test_contains() {
        let host = Token::attribute("Cluster", "Endpoint.Address");
        let url = Token::join([Token::literal("postgresql://"), host.clone()]);
        assert!(url.contains(&host));
        assert!(!url.contains(&Token::attribute("Cluster", "Endpoint.Port")));
    }
}
