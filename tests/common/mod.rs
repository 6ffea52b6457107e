#![allow(dead_code, unused_imports)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `models`: Post / Comment / User objects and `TestBuildContext`
//! - `dao`: recording in-memory DAO
//! - `assertions`: assertion helpers with better failure messages

pub mod assertions;
pub mod dao;
pub mod models;

use std::sync::Arc;

use model_builder::{BuildContext, ModelBuilder, Namespace, ResolveConfig, Value};

pub use assertions::{assert_error_contains, assert_no_repeats};
pub use dao::{CallLog, TestDao, USER_MAX};
pub use models::{Comment, Fake, HasUser, Post, SubUser, TestBuildContext, User};

/// The full configuration exercised by most tests.
///
/// - every `User`, `Post` and `Comment` registers itself
/// - `Comment` mentions users, anything `HasUser` has an author
/// - a `Post` carries its loaded comments
/// - one batch builder per entity, `User -> isFollowing`
/// - lazy `isFans` / `isFans3` from `User`, two lazies from the never-filled `Fake`
pub fn model_builder(dao: &Arc<TestDao>) -> ModelBuilder<TestBuildContext> {
    model_builder_with(dao, ResolveConfig::default())
}

pub fn model_builder_with(
    dao: &Arc<TestDao>,
    config: ResolveConfig,
) -> ModelBuilder<TestBuildContext> {
    let builder = ModelBuilder::with_config(config);

    builder
        .declare::<Post>()
        .implements::<dyn HasUser, _>(|p| p as &dyn HasUser);
    builder
        .declare::<Comment>()
        .implements::<dyn HasUser, _>(|c| c as &dyn HasUser);
    builder.declare::<SubUser>().extends::<User, _>(|s| &s.base);

    builder
        .register_self::<User, _, _>(|u| u.id)
        .register_self::<Post, _, _>(|p| p.id)
        .register_self::<Comment, _, _>(|c| c.id);

    builder
        .on::<Comment>()
        .ids(|c| c.at_user_ids.clone().unwrap_or_default())
        .to(Namespace::of::<User>());
    builder
        .on_view::<dyn HasUser>()
        .id(|h| h.user_id())
        .to(Namespace::of::<User>());
    builder
        .on::<Post>()
        .values(|p| p.comments.clone(), |c: &Comment| c.id)
        .to(Namespace::of::<Comment>());

    let d = Arc::clone(dao);
    builder.build_self(Namespace::of::<User>(), move |_ctx, ids: &[i32]| Ok(d.get_users(ids)));
    let d = Arc::clone(dao);
    builder.build_self(Namespace::of::<Post>(), move |_ctx, ids: &[i64]| Ok(d.get_posts(ids)));
    let d = Arc::clone(dao);
    builder.build_self(Namespace::of::<Comment>(), move |_ctx, ids: &[i64]| {
        Ok(d.get_comments(ids))
    });
    let d = Arc::clone(dao);
    builder
        .build(Namespace::of::<User>())
        .by(move |ctx: &TestBuildContext, ids: &[i32]| Ok(d.is_following(ctx.visitor_id(), ids)))
        .to("isFollowing");

    let d = Arc::clone(dao);
    builder.lazy(
        Namespace::of::<User>(),
        move |ctx: &TestBuildContext, ids: &[i32]| Ok(d.is_fans(ctx.visitor_id(), ids)),
        "isFans",
    );
    let d = Arc::clone(dao);
    builder.lazy(
        Namespace::of::<User>(),
        move |ctx: &TestBuildContext, ids: &[i32]| Ok(d.is_fans(ctx.visitor_id(), ids)),
        "isFans3",
    );
    let d = Arc::clone(dao);
    builder.lazy(
        Namespace::of::<Fake>(),
        move |ctx: &TestBuildContext, ids: &[i32]| Ok(d.is_fans(ctx.visitor_id(), ids)),
        "unreachedLazy",
    );
    let d = Arc::clone(dao);
    builder.lazy(
        Namespace::of::<Fake>(),
        move |ctx: &TestBuildContext, ids: &[i32]| {
            ctx.data("unreachedLazy")?;
            Ok(d.is_fans(ctx.visitor_id(), ids))
        },
        "unreachedLazy2",
    );

    builder
}

/// Users `ids` as seed values, built without touching the DAO.
pub fn user_seeds(ids: &[i32]) -> Vec<Value> {
    ids.iter().map(|id| Value::new(User { id: *id })).collect()
}
