//! User procedures (`user.*`).

use serde::Deserialize;
use serde_json::Value;

use portal_common::rpc::{FieldError, RpcError};

use super::{store_error, RequestContext};

/// `user.getAll` (public): every mirrored user row, store order.
pub fn get_all(ctx: &RequestContext) -> Result<Value, RpcError> {
    let users = ctx.store.list().map_err(store_error)?;
    to_value(users)
}

/// `user.getCurrent` (protected): the row bound to the caller's session.
pub fn get_current(ctx: &RequestContext) -> Result<Value, RpcError> {
    let session = ctx.require_session()?;
    let user_id = session
        .user
        .local_user_id
        .ok_or_else(|| RpcError::internal("No user ID in session"))?;

    let user = ctx
        .store
        .find_by_id(user_id)
        .map_err(store_error)?
        .ok_or_else(|| RpcError::internal("No user ID in session"))?;

    to_value(user)
}

#[derive(Debug, Deserialize)]
struct UpdateProfileInput {
    name: String,
}

/// `user.updateProfile` (protected): rename the signed-in user and
/// return the updated row.
pub fn update_profile(ctx: &RequestContext, input: Option<Value>) -> Result<Value, RpcError> {
    let session = ctx.require_session()?;
    let user_id = session
        .user
        .local_user_id
        .ok_or_else(|| RpcError::internal("No user ID in session"))?;

    let input = parse_update_profile(input)?;

    let user = ctx
        .store
        .update_display_name(user_id, &input.name)
        .map_err(store_error)?;

    to_value(user)
}

/// Schema check for `user.updateProfile`, applied before the store is
/// touched. Failures carry per-field detail.
fn parse_update_profile(input: Option<Value>) -> Result<UpdateProfileInput, RpcError> {
    let raw = input.ok_or_else(|| {
        RpcError::bad_request("Invalid input", vec![FieldError::new("name", "Required")])
    })?;

    let parsed: UpdateProfileInput = serde_json::from_value(raw).map_err(|e| {
        RpcError::bad_request("Invalid input", vec![FieldError::new("name", e.to_string())])
    })?;

    if parsed.name.is_empty() {
        return Err(RpcError::bad_request(
            "Invalid input",
            vec![FieldError::new(
                "name",
                "String must contain at least 1 character(s)",
            )],
        ));
    }

    Ok(parsed)
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_common::rpc::RpcErrorCode;
    use portal_common::User;
    use rstest::rstest;
    use serde_json::json;

    use crate::test_util::{seeded_context, session_for, test_context};

    #[test]
    fn test_get_all_is_public() {
        let (mut ctx, user) = seeded_context();
        ctx.session = None;

        let value = get_all(&ctx).unwrap();
        let users: Vec<User> = serde_json::from_value(value).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, user.id);
    }

    #[test]
    fn test_get_current_returns_session_row() {
        let (ctx, user) = seeded_context();
        let value = get_current(&ctx).unwrap();
        let current: User = serde_json::from_value(value).unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.external_id, user.external_id);
    }

    #[test]
    fn test_get_current_without_session() {
        let ctx = test_context(None);
        let error = get_current(&ctx).unwrap_err();
        assert_eq!(error.code, RpcErrorCode::Unauthorized);
        assert_eq!(error.message, "UNAUTHORIZED");
    }

    #[test]
    fn test_get_current_session_without_local_id() {
        let (mut ctx, _user) = seeded_context();
        ctx.session = Some(session_for(None));

        let error = get_current(&ctx).unwrap_err();
        assert_eq!(error.code, RpcErrorCode::InternalServerError);
        assert_eq!(error.message, "No user ID in session");
    }

    #[test]
    fn test_update_profile_renames_only_bound_row() {
        let (ctx, user) = seeded_context();
        let other = ctx
            .store
            .insert(&crate::store::NewUser {
                external_id: "kc-other".to_string(),
                email: "other@x.com".to_string(),
                display_name: Some("Other".to_string()),
            })
            .unwrap();

        let value = update_profile(&ctx, Some(json!({ "name": "Ada" }))).unwrap();
        let updated: User = serde_json::from_value(value).unwrap();
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.display_name.as_deref(), Some("Ada"));

        let untouched = ctx.store.find_by_id(other.id).unwrap().unwrap();
        assert_eq!(untouched.display_name.as_deref(), Some("Other"));
    }

    #[test]
    fn test_update_profile_empty_name_rejected_before_mutation() {
        let (ctx, user) = seeded_context();

        let error = update_profile(&ctx, Some(json!({ "name": "" }))).unwrap_err();
        assert_eq!(error.code, RpcErrorCode::BadRequest);
        assert_eq!(error.field_errors[0].field, "name");

        let row = ctx.store.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(row.display_name, user.display_name);
    }

    #[rstest]
    #[case::missing_input(None)]
    #[case::missing_field(Some(json!({})))]
    #[case::wrong_type(Some(json!({ "name": 42 })))]
    #[case::empty_string(Some(json!({ "name": "" })))]
    fn test_update_profile_input_validation(#[case] input: Option<Value>) {
        let (ctx, _user) = seeded_context();

        let error = update_profile(&ctx, input).unwrap_err();
        assert_eq!(error.code, RpcErrorCode::BadRequest);
        assert_eq!(error.field_errors.len(), 1);
        assert_eq!(error.field_errors[0].field, "name");
    }

    #[test]
    fn test_update_profile_without_session() {
        let ctx = test_context(None);
        let error = update_profile(&ctx, Some(json!({ "name": "Ada" }))).unwrap_err();
        assert_eq!(error.code, RpcErrorCode::Unauthorized);
    }
}
