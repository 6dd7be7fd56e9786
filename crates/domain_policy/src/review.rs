//! Customer reviews of purchased policies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{PolicyId, ReviewId, UserId};

use crate::error::PolicyError;
use crate::policy::Policy;

/// One review per (policy, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyReview {
    pub id: ReviewId,
    pub policy_id: PolicyId,
    pub user_id: UserId,
    /// 1 to 5 stars
    pub rating: i16,
    pub title: String,
    pub comment: String,
    /// The reviewed policy has at least one completed payment
    pub is_verified_purchase: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyReview {
    /// Writes a review of `policy` by `author`
    ///
    /// Only the policy holder may review. New reviews await publication by
    /// staff.
    pub fn write(
        policy: &Policy,
        author: UserId,
        rating: i16,
        title: impl Into<String>,
        comment: impl Into<String>,
        has_completed_payment: bool,
    ) -> Result<Self, PolicyError> {
        if policy.user_id != author {
            return Err(PolicyError::validation("You can only review your own policies"));
        }
        if !(1..=5).contains(&rating) {
            return Err(PolicyError::validation("Rating must be between 1 and 5"));
        }
        let title = title.into();
        if title.trim().is_empty() || title.chars().count() > 200 {
            return Err(PolicyError::validation("Title must be 1-200 characters"));
        }
        let now = Utc::now();
        Ok(Self {
            id: ReviewId::new_v7(),
            policy_id: policy.id,
            user_id: author,
            rating,
            title,
            comment: comment.into(),
            is_verified_purchase: has_completed_payment,
            is_published: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn publish(&mut self) {
        self.is_published = true;
        self.updated_at = Utc::now();
    }
}
