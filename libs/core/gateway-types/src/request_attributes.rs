//! Request attributes: hop-count and origin metadata propagated across
//! peer requests. Terminates forwarding loops.

use crate::error::GatewayError;

/// Default hop ceiling; configurable by the caller.
pub const DEFAULT_MAX_HOPS: u32 = 3;

#[derive(Clone, Debug, Default)]
pub struct RequestAttributes {
    pub hops: u32,
    pub origin: Option<String>,
    pub origin_node_release: Option<String>,
    pub arns_name: Option<String>,
    pub arns_basename: Option<String>,
    pub arns_record: Option<String>,
}

impl RequestAttributes {
    /// Validates `hops <= max_hops` and returns a copy with `hops`
    /// incremented, ready to attach to an outbound peer request.
    pub fn for_forward(&self, max_hops: u32) -> Result<Self, GatewayError> {
        if self.hops >= max_hops {
            return Err(GatewayError::HopLimitExceeded);
        }
        Ok(Self {
                hops: self.hops + 1,
                ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_hops_under_limit() {
        let attrs = RequestAttributes {
            hops: 1,
            ..Default::default()
        };
        let forwarded = attrs.for_forward(DEFAULT_MAX_HOPS).unwrap();
        assert_eq!(forwarded.hops, 2);
    }

    #[test]
    fn rejects_at_limit() {
        let attrs = RequestAttributes {
            hops: DEFAULT_MAX_HOPS,
            ..Default::default()
        };
        assert!(matches!(
                attrs.for_forward(DEFAULT_MAX_HOPS),
                Err(GatewayError::HopLimitExceeded)
        ));
    }

    #[test]
    fn rejects_above_limit() {
        let attrs = RequestAttributes {
            hops: DEFAULT_MAX_HOPS + 5,
            ..Default::default()
        };
        assert!(attrs.for_forward(DEFAULT_MAX_HOPS).is_err());
    }
}
