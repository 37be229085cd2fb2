//! Active Directory entry types and the relations between them.

use tracing::debug;

use crate::{
    directory::Directory,
    model::{Model, ModelType},
    relation::{HasMany, HasManyIn, HasOne},
    Result,
};

/// Attribute on a user holding the RID of its primary group.
pub const PRIMARY_GROUP_ID: &str = "primarygroupid";

/// User accounts.
#[must_use]
pub fn user() -> ModelType {
    ModelType::new("user", ["top", "person", "organizationalPerson", "user"])
}

/// Security and distribution groups.
#[must_use]
pub fn group() -> ModelType {
    ModelType::new("group", ["top", "group"])
}

/// Mail contacts.
#[must_use]
pub fn contact() -> ModelType {
    ModelType::new("contact", ["top", "person", "organizationalPerson", "contact"])
}

/// Computer accounts.
#[must_use]
pub fn computer() -> ModelType {
    ModelType::new(
        "computer",
        ["top", "person", "organizationalPerson", "user", "computer"],
    )
}

/// Groups that list `model` in their `member` attribute.
#[must_use]
pub fn groups(model: &Model) -> HasMany<'_> {
    model.has_many(group(), "member").named("groups")
}

/// The user named by `model`'s `manager` attribute.
#[must_use]
pub fn manager(model: &Model) -> HasOne<'_> {
    model.has_one(user(), "manager").named("manager")
}

/// Members of a group, found through their `memberof` and changed through the group's `member`.
#[must_use]
pub fn members(group_model: &Model) -> HasMany<'_> {
    group_model
        .has_many([group(), user(), contact(), computer()], "memberof")
        .using("member")
        .named("members")
}

/// Groups listed in `model`'s `memberof` attribute.
///
/// `memberof` is maintained by the server; change membership through [`members`] or [`groups`].
#[must_use]
pub fn member_of(model: &Model) -> HasManyIn<'_> {
    model.has_many_in(group(), "memberof").named("member_of")
}

/// Resolves a user's primary group.
///
/// The primary group is not listed in `memberof`. Its SID is the user's SID with the RID
/// replaced by `primarygroupid`. Returns `None` when the user lacks either attribute or the group
/// does not exist.
///
/// # Errors
///
/// Returns a codec error if the stored SID is malformed, or the transport error.
pub async fn primary_group(dir: &mut Directory, user: &Model) -> Result<Option<Model>> {
    let Some(sid) = user.sid().transpose()? else {
        return Ok(None);
    };
    let Some(rid) = user
        .entry()
        .first_str(PRIMARY_GROUP_ID)
        .and_then(|rid| rid.trim().parse::<u32>().ok())
    else {
        return Ok(None);
    };

    let group_sid = sid.with_rid(rid);
    debug!(user = %sid, group = %group_sid, "resolving primary group");
    Ok(dir
        .find_by_sid(&group_sid)
        .await?
        .map(|entry| Model::new(group(), entry)))
}
