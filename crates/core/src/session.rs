//! Per-request review session parameters and proxy variants.
//!
//! Session identity travels on the query string of every proxied URL rather
//! than in cookies, so each rewritten link carries it forward.

use crate::annotation::Author;
use crate::runtime::RuntimeMode;

/// Context sentinel used when a request carries no review session.
pub const UNDEFINED_CONTEXT: &str = "Undefined";

/// Reviewer sentinel used when name or email is absent.
pub const ANONYMOUS: &str = "Anonymous";

/// Query parameter names forwarded on rewritten URLs.
pub const CONTEXT_PARAM: &str = "context";
pub const REVIEWER_NAME_PARAM: &str = "reviewerName";
pub const REVIEWER_EMAIL_PARAM: &str = "reviewerEmail";

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// The three ways a page can be served. They share fetch and rewrite and
/// differ only in what gets injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyVariant {
    /// Full runtime: pin creation plus replay.
    Interactive,
    /// Replay-only runtime for read-only summaries.
    Dashboard,
    /// Rewriting only, nothing injected.
    Preview,
}

impl ProxyVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Dashboard => "dashboard",
            Self::Preview => "preview",
        }
    }

    /// Runtime flavour to inject, if any.
    pub fn runtime_mode(&self) -> Option<RuntimeMode> {
        match self {
            Self::Interactive => Some(RuntimeMode::Annotate),
            Self::Dashboard => Some(RuntimeMode::Replay),
            Self::Preview => None,
        }
    }

    /// Whether existing annotations are looked up for this variant.
    pub fn loads_feedback(&self) -> bool {
        self.runtime_mode().is_some()
    }
}

// ---------------------------------------------------------------------------
// Session parameters
// ---------------------------------------------------------------------------

/// Identity carried by the current proxied request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    pub context: Option<String>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SessionParams {
    /// The review context, if one was supplied and is not blank.
    pub fn context(&self) -> Option<&str> {
        non_blank(&self.context)
    }

    pub fn context_or_sentinel(&self) -> &str {
        self.context().unwrap_or(UNDEFINED_CONTEXT)
    }

    /// Reviewer identity with anonymous sentinels filled in.
    pub fn reviewer(&self) -> Author {
        Author::new(
            non_blank(&self.reviewer_name).unwrap_or(ANONYMOUS),
            non_blank(&self.reviewer_email).unwrap_or(ANONYMOUS),
        )
    }

    /// Parameters appended to every rewritten URL for `variant`.
    ///
    /// Interactive pages always forward the full identity (with sentinels),
    /// dashboards forward only a supplied context, previews forward nothing.
    pub fn forwarded(&self, variant: ProxyVariant) -> Vec<(String, String)> {
        match variant {
            ProxyVariant::Interactive => {
                let reviewer = self.reviewer();
                vec![
                    (CONTEXT_PARAM.to_string(), self.context_or_sentinel().to_string()),
                    (REVIEWER_NAME_PARAM.to_string(), reviewer.name),
                    (REVIEWER_EMAIL_PARAM.to_string(), reviewer.email),
                ]
            }
            ProxyVariant::Dashboard => self
                .context()
                .map(|c| vec![(CONTEXT_PARAM.to_string(), c.to_string())])
                .unwrap_or_default(),
            ProxyVariant::Preview => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn full_session() -> SessionParams {
        SessionParams {
            context: Some("c1".to_string()),
            reviewer_name: Some("Ada".to_string()),
            reviewer_email: Some("ada@example.com".to_string()),
        }
    }

    #[test]
    fn variant_runtime_modes() {
        assert_eq!(ProxyVariant::Interactive.runtime_mode(), Some(RuntimeMode::Annotate));
        assert_eq!(ProxyVariant::Dashboard.runtime_mode(), Some(RuntimeMode::Replay));
        assert_eq!(ProxyVariant::Preview.runtime_mode(), None);
        assert!(!ProxyVariant::Preview.loads_feedback());
    }

    #[test]
    fn missing_identity_falls_back_to_sentinels() {
        let session = SessionParams::default();
        assert_eq!(session.context(), None);
        assert_eq!(session.context_or_sentinel(), UNDEFINED_CONTEXT);
        assert_eq!(session.reviewer(), Author::new(ANONYMOUS, ANONYMOUS));
    }

    #[test]
    fn blank_context_is_treated_as_absent() {
        let session = SessionParams {
            context: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(session.context(), None);
    }

    #[test]
    fn interactive_forwards_full_identity() {
        let forwarded = full_session().forwarded(ProxyVariant::Interactive);
        assert_eq!(
            forwarded,
            vec![
                ("context".to_string(), "c1".to_string()),
                ("reviewerName".to_string(), "Ada".to_string()),
                ("reviewerEmail".to_string(), "ada@example.com".to_string()),
            ]
        );
    }

    #[test]
    fn interactive_forwards_sentinels_when_anonymous() {
        let forwarded = SessionParams::default().forwarded(ProxyVariant::Interactive);
        assert_eq!(forwarded[0].1, UNDEFINED_CONTEXT);
        assert_eq!(forwarded[1].1, ANONYMOUS);
    }

    #[test]
    fn dashboard_forwards_context_only() {
        let forwarded = full_session().forwarded(ProxyVariant::Dashboard);
        assert_eq!(forwarded, vec![("context".to_string(), "c1".to_string())]);
        assert!(SessionParams::default()
            .forwarded(ProxyVariant::Dashboard)
            .is_empty());
    }

    #[test]
    fn preview_forwards_nothing() {
        assert!(full_session().forwarded(ProxyVariant::Preview).is_empty());
    }
}
