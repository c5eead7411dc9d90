use anyhow::anyhow;

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InspectMethod {
    Inspect,
    Content,
}

impl InspectMethod {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "inspect" | "txpool_inspect" => Ok(Self::Inspect),
            "content" | "txpool_content" => Ok(Self::Content),
            _ => Err(anyhow!("unsupported sampling.inspect_method: {raw}").into()),
        }
    }

    pub fn rpc_method(self) -> &'static str {
        match self {
            Self::Inspect => "txpool_inspect",
            Self::Content => "txpool_content",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InspectMethod;

    #[test]
    fn inspect_method_parses_aliases() {
        assert_eq!(InspectMethod::parse(" Inspect ").unwrap(), InspectMethod::Inspect);
        assert_eq!(
            InspectMethod::parse("txpool_content").unwrap(),
            InspectMethod::Content
        );
        assert!(InspectMethod::parse("contentFrom").is_err());
    }
}
