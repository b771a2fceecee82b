//! cdn node

use super::{arg_bool, arg_str, children, positional, unknown_node};
use crate::error::{Result, StackError};
use crate::model::CdnConfig;
use kdl::KdlNode;

pub fn parse_cdn(node: &KdlNode, cdn: &mut CdnConfig) -> Result<()> {
    for child in children(node) {
        match child.name().value() {
            "price-class" => cdn.price_class = arg_str(child)?.parse()?,
            "ipv6" => cdn.ipv6 = arg_bool(child)?,
            // cached-paths "assets/*" "icon/*"
            "cached-paths" => {
                cdn.cached_paths = positional(child)
                    .map(|v| {
                        v.as_string().map(|s| s.to_string()).ok_or_else(|| {
                            StackError::InvalidConfig(
                                "'cached-paths' entries must be strings".to_string(),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            other => unknown_node("cdn", other),
        }
    }
    Ok(())
}
