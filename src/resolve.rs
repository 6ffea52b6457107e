//! The fixpoint resolution loop.
//!
//! Each round:
//!
//! 1. drops objects already processed in this call (by identity) and objects
//!    no extractor applies to
//! 2. runs value extractors, keeping entries whose id is not yet in the
//!    context; their ids also count as pending for that namespace
//! 3. runs id extractors, keeping ids not in the context and not already
//!    supplied by a value extractor
//! 4. calls every builder registered on a namespace with pending ids, for the
//!    ids its target namespace neither holds nor was already asked for
//! 5. merges the round's values into the context and records the asked ids
//! 6. feeds the newly merged values back in as the next working set
//!
//! Builders are grouped by target namespace. Groups are independent and may
//! run on the rayon pool; builders in a group run in registration order so a
//! later one never asks for what an earlier one produced.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use model_builder_context::BuildContext;
use model_builder_resolver::{BatchBuilder, Dispatch, TypeKey};
use model_builder_types::{BuildError, Key, Namespace, Value};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::builder::ModelBuilder;

/// Summary of one `resolve` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    /// Rounds executed (0 when nothing was seeded)
    pub rounds: usize,
    /// Batch builder invocations
    pub builder_calls: usize,
    /// Ids handed to batch builders
    pub requested_ids: usize,
    /// Entries newly merged into the context
    pub merged_values: usize,
}

/// Builders sharing one target namespace, with the pending ids each consumes.
struct BuilderGroup<'r, B> {
    target: Namespace,
    members: Vec<(Arc<BatchBuilder<B>>, &'r HashSet<Key>)>,
}

#[derive(Default)]
struct GroupOutcome {
    values: HashMap<Key, Value>,
    requested: HashSet<Key>,
    calls: usize,
    asked: usize,
}

impl<B: BuildContext> ModelBuilder<B> {
    /// Resolve everything reachable from `sources` into `ctx`.
    ///
    /// Registered lazy declarations are installed into `ctx` first, even
    /// when `sources` is empty. A failing builder aborts the call; rounds
    /// already merged stay in `ctx`.
    pub fn resolve<I>(&self, sources: I, ctx: &B) -> Result<ResolveReport>
    where
        I: IntoIterator<Item = Value>,
    {
        if self.guard.freeze() {
            debug!("model builder frozen by first resolve");
        }
        self.metrics.record_resolve();
        let started = Instant::now();
        self.install_lazies(ctx);

        let mut report = ResolveReport::default();
        let mut seen: HashSet<Value> = HashSet::new();
        let mut working: Vec<Value> = sources.into_iter().collect();
        while !working.is_empty() {
            if let Some(limit) = self.config.max_rounds {
                if report.rounds >= limit {
                    return Err(BuildError::RoundLimitExceeded {
                        limit,
                        pending: working.len(),
                    }
                    .into());
                }
            }
            report.rounds += 1;
            self.metrics.record_round();
            working = self.run_round(report.rounds, working, &mut seen, ctx, &mut report)?;
        }

        debug!(
            rounds = report.rounds,
            builder_calls = report.builder_calls,
            requested = report.requested_ids,
            merged = report.merged_values,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resolve finished"
        );
        Ok(report)
    }

    /// Resolve from a single seed. `None` only installs lazy declarations.
    pub fn resolve_one(&self, source: Option<Value>, ctx: &B) -> Result<ResolveReport> {
        self.resolve(source, ctx)
    }

    /// Alias of [`resolve`](Self::resolve).
    pub fn resolve_all<I>(&self, sources: I, ctx: &B) -> Result<ResolveReport>
    where
        I: IntoIterator<Item = Value>,
    {
        self.resolve(sources, ctx)
    }

    fn install_lazies(&self, ctx: &B) {
        for decl in self.registry.lazies() {
            let target = decl.target().clone();
            if ctx.store().declare_lazy(decl) {
                self.metrics.record_lazy_install();
                trace!(namespace = %target, "installed lazy namespace");
            }
        }
    }

    /// Run one round over `working`, returning the values it added.
    ///
    /// Ids supplied by a value extractor are pending for builders on that
    /// namespace as well, so follow-up builders such as `User -> isFollowing`
    /// also run for objects that arrived by value.
    fn run_round(
        &self,
        round: usize,
        working: Vec<Value>,
        seen: &mut HashSet<Value>,
        ctx: &B,
        report: &mut ResolveReport,
    ) -> Result<Vec<Value>> {
        let objects: Vec<(Value, Arc<Dispatch>)> = working
            .into_iter()
            .filter(|object| seen.insert(object.clone()))
            .filter_map(|object| {
                let concrete = TypeKey::from_parts(object.concrete_type(), object.type_name());
                let dispatch = self.registry.dispatch_for(concrete);
                if dispatch.is_empty() {
                    trace!(round, object = ?object, "no extractors apply");
                    return None;
                }
                Some((object, dispatch))
            })
            .collect();

        let mut pending_values: HashMap<Namespace, HashMap<Key, Value>> = HashMap::new();
        let mut pending_ids: HashMap<Namespace, HashSet<Key>> = HashMap::new();

        for (object, dispatch) in &objects {
            trace!(round, object = ?object, "extracting values");
            for (extractor, route) in &dispatch.values {
                let target = extractor.target();
                let existing = ctx.data(target.clone())?;
                for (key, value) in extractor.extract(object, route) {
                    if existing.contains(&key) {
                        continue;
                    }
                    pending_values
                        .entry(target.clone())
                        .or_default()
                        .entry(key.clone())
                        .or_insert(value);
                    pending_ids.entry(target.clone()).or_default().insert(key);
                }
            }
        }

        for (object, dispatch) in &objects {
            trace!(round, object = ?object, "extracting ids");
            for (extractor, route) in &dispatch.ids {
                let target = extractor.target();
                let existing = ctx.data(target.clone())?;
                let supplied = pending_values.get(target);
                for key in extractor.extract(object.as_any(), route) {
                    if existing.contains(&key) || supplied.is_some_and(|m| m.contains_key(&key)) {
                        continue;
                    }
                    pending_ids.entry(target.clone()).or_default().insert(key);
                }
            }
        }

        let groups = self.group_builders(&pending_ids);
        let outcomes: Vec<GroupOutcome> = if self.config.parallel_builders && groups.len() > 1 {
            groups
                .par_iter()
                .map(|group| self.run_group(round, group, ctx, &pending_values))
                .collect::<Result<Vec<_>>>()?
        } else {
            groups
                .iter()
                .map(|group| self.run_group(round, group, ctx, &pending_values))
                .collect::<Result<Vec<_>>>()?
        };

        let mut requested: HashMap<Namespace, HashSet<Key>> = HashMap::new();
        for (group, outcome) in groups.iter().zip(outcomes) {
            report.builder_calls += outcome.calls;
            report.requested_ids += outcome.asked;
            let slot = pending_values.entry(group.target.clone()).or_default();
            for (key, value) in outcome.values {
                slot.entry(key).or_insert(value);
            }
            requested
                .entry(group.target.clone())
                .or_default()
                .extend(outcome.requested);
        }

        let mut merged = Vec::new();
        for (namespace, values) in pending_values {
            let inserted = ctx.store().extend(ctx, &namespace, values)?;
            trace!(round, namespace = %namespace, inserted = inserted.len(), "merged namespace");
            merged.extend(inserted);
        }
        for (namespace, keys) in requested {
            ctx.store().mark_requested(ctx, &namespace, keys)?;
        }

        report.merged_values += merged.len();
        self.metrics.record_merged(merged.len());
        debug!(
            round,
            objects = objects.len(),
            merged = merged.len(),
            "round complete"
        );
        Ok(merged)
    }

    fn group_builders<'r>(
        &self,
        pending_ids: &'r HashMap<Namespace, HashSet<Key>>,
    ) -> Vec<BuilderGroup<'r, B>> {
        let mut groups: Vec<BuilderGroup<'r, B>> = Vec::new();
        let mut index: HashMap<Namespace, usize> = HashMap::new();
        for (source, ids) in pending_ids {
            for builder in self.registry.builders_for(source) {
                let target = builder.target().clone();
                let slot = *index.entry(target.clone()).or_insert_with(|| {
                    groups.push(BuilderGroup {
                        target,
                        members: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].members.push((builder, ids));
            }
        }
        groups
    }

    fn run_group(
        &self,
        round: usize,
        group: &BuilderGroup<'_, B>,
        ctx: &B,
        pending_values: &HashMap<Namespace, HashMap<Key, Value>>,
    ) -> Result<GroupOutcome> {
        let existing = ctx.data(group.target.clone())?;
        let supplied = pending_values.get(&group.target);
        let mut outcome = GroupOutcome::default();

        for (builder, ids) in &group.members {
            let needed: Vec<Key> = ids
                .iter()
                .filter(|key| {
                    !existing.is_known(key)
                        && !outcome.values.contains_key(*key)
                        && !supplied.is_some_and(|m| m.contains_key(*key))
                })
                .cloned()
                .collect();
            if needed.is_empty() {
                continue;
            }

            let started = Instant::now();
            let built = builder.run(ctx, &needed).with_context(|| {
                format!(
                    "builder {} -> {} failed for {} ids",
                    builder.source(),
                    builder.target(),
                    needed.len()
                )
            })?;
            self.metrics.record_builder_call(needed.len());
            debug!(
                round,
                source = %builder.source(),
                target = %builder.target(),
                requested = needed.len(),
                returned = built.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "builder call"
            );
            if built.is_empty() && self.config.warn_on_empty_builder {
                warn!(
                    source = %builder.source(),
                    target = %builder.target(),
                    requested = needed.len(),
                    "builder returned no values"
                );
            }

            outcome.calls += 1;
            outcome.asked += needed.len();
            outcome.requested.extend(needed);
            for (key, value) in built {
                outcome.values.entry(key).or_insert(value);
            }
        }
        Ok(outcome)
    }
}
