//! Quota policy
//!
//! Decides how many items each fetcher is asked for. Kept apart from the
//! composer so the proportions can be tuned and tested on their own.

use crate::error::{FeedError, Result};
use crate::models::{ContentKind, FeedTab};

/// Absorbs float noise such as `10.0 * 0.7 == 7.000000000000001`.
const SHARE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct QuotaPolicy {
    pub short_post_share: f64,
    pub poll_share: f64,
    pub story_share: f64,
    /// Fraction of each kind's quota reserved for authors outside the following set
    pub discovery_share: f64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            short_post_share: 0.5,
            poll_share: 0.3,
            story_share: 0.2,
            discovery_share: 0.3,
        }
    }
}

/// Per-kind quota split between the two fetch plans of discovery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubQuotas {
    pub in_set: usize,
    pub discovery: usize,
}

impl QuotaPolicy {
    pub fn validate(&self) -> Result<()> {
        let shares = [
            ("short_post_share", self.short_post_share),
            ("poll_share", self.poll_share),
            ("story_share", self.story_share),
            ("discovery_share", self.discovery_share),
        ];
        for (name, value) in shares {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(FeedError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.short_post_share + self.poll_share + self.story_share <= 0.0 {
            return Err(FeedError::Config(
                "at least one content kind needs a positive share".to_string(),
            ));
        }
        Ok(())
    }

    pub fn share(&self, kind: ContentKind) -> f64 {
        match kind {
            ContentKind::ShortPost => self.short_post_share,
            ContentKind::Poll => self.poll_share,
            ContentKind::Story => self.story_share,
        }
    }

    /// Items to request from `kind` to serve a page of `limit` on `tab`.
    ///
    /// One look-ahead row is included so the composer can tell whether more
    /// content exists past the page.
    pub fn kind_quota(&self, tab: FeedTab, kind: ContentKind, limit: usize) -> usize {
        let wanted = limit.saturating_add(1);
        if tab.is_aggregate() {
            ceil_share(wanted, self.share(kind))
        } else {
            wanted
        }
    }

    /// Split a kind quota into the in-set (majority) and discovery (minority) parts.
    ///
    /// With an empty following set the discovery plan takes the whole quota.
    pub fn split_discovery(&self, quota: usize, has_following: bool) -> SubQuotas {
        if !has_following {
            return SubQuotas {
                in_set: 0,
                discovery: quota,
            };
        }
        let in_set = ceil_share(quota, 1.0 - self.discovery_share).min(quota);
        SubQuotas {
            in_set,
            discovery: quota - in_set,
        }
    }
}

/// `ceil(n * share)`
fn ceil_share(n: usize, share: f64) -> usize {
    if share <= 0.0 || n == 0 {
        return 0;
    }
    ((n as f64 * share) - SHARE_EPSILON).ceil().max(0.0) as usize
}
