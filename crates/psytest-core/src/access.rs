//! Visibility and plan gating.

use crate::error::{Result, TestError};
use crate::model::{Role, TestDefinition, User, Visibility};
use crate::results::TestResult;

/// Whether `user` may attempt `test`.
///
/// Private tests are admin-only. A non-empty plan list restricts the test to
/// users holding one of those plans; admins bypass it.
pub fn check_access(test: &TestDefinition, user: &User) -> Result<()> {
    if user.role == Role::Admin {
        return Ok(());
    }
    if test.visibility == Visibility::Private {
        return Err(TestError::Unauthorized(format!(
            "test '{}' is private",
            test.id
        )));
    }
    if test.plans.is_empty() {
        return Ok(());
    }
    match &user.plan {
        Some(plan) if test.plans.iter().any(|p| p == plan) => Ok(()),
        Some(plan) => Err(TestError::Unauthorized(format!(
            "plan '{plan}' does not include test '{}'",
            test.id
        ))),
        None => Err(TestError::Unauthorized(format!(
            "test '{}' requires a subscription plan",
            test.id
        ))),
    }
}

/// Only the owner of a result may read or delete it.
pub fn check_result_owner(result: &TestResult, user: &User) -> Result<()> {
    if result.user_id == user.id {
        Ok(())
    } else {
        Err(TestError::Unauthorized(format!(
            "result {} belongs to another user",
            result.id
        )))
    }
}
