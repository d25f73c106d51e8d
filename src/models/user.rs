use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const FREE_PLAN_LIMIT: i32 = 2;
pub const PREMIUM_PLAN_LIMIT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Premium,
    Business,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Premium => "premium",
            SubscriptionPlan::Business => "business",
        }
    }

    /// Processing ceiling for the plan; `None` means unlimited.
    pub fn processing_limit(&self) -> Option<i32> {
        match self {
            SubscriptionPlan::Free => Some(FREE_PLAN_LIMIT),
            SubscriptionPlan::Premium => Some(PREMIUM_PLAN_LIMIT),
            SubscriptionPlan::Business => None,
        }
    }
}

impl Default for SubscriptionPlan {
    fn default() -> Self {
        SubscriptionPlan::Free
    }
}

impl fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionPlan::Free),
            "premium" => Ok(SubscriptionPlan::Premium),
            "business" => Ok(SubscriptionPlan::Business),
            other => Err(format!("Invalid subscription plan: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: Option<String>,
    pub subscription_plan: SubscriptionPlan,
    pub processing_count: i32,
    pub free_trial_used: bool,
}

/// Registration input. `password` is already hashed by the time it reaches the repository.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<Option<String>>,
    pub password: Option<String>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub free_trial_used: Option<bool>,
}

impl UserUpdate {
    pub fn plan(plan: SubscriptionPlan) -> Self {
        Self {
            subscription_plan: Some(plan),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(password) = &self.password {
            user.password = password.clone();
        }
        if let Some(plan) = self.subscription_plan {
            user.subscription_plan = plan;
        }
        if let Some(used) = self.free_trial_used {
            user.free_trial_used = used;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}
