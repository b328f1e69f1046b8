//! Document pruning
//!
//! Pruning is the repairing variant of validation: non-conforming parts
//! of a document are removed or cleared where the count constraints allow
//! it. When a block cannot be repaired locally and cannot be removed, the
//! failure cascades to the nearest ancestor whose removal is allowed, or
//! is reported at the document root.

use docvet_core::{Block, BlockKind, Document, Result, ALL_BLOCK_ATTRIBUTES};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

use crate::block_constraint::{BlockConstraint, Match};
use crate::result::{EntityRef, ValidationResult, ValueDiscarder};
use crate::string_constraint::{ConstraintMap, ValueContext};
use crate::validation::{ConstraintKey, ConstraintSetRef, Validator};

/// What the caller should do with a block after pruning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PruneStatus {
    /// Valid or fixed in place
    Keep,
    /// The block cannot be repaired; the caller should remove it
    RemoveMe,
}

/// Which constraints matched a block, recorded during the match phase.
struct BlockMatchInfo<'v> {
    defined: bool,
    matched_constraints: Vec<ConstraintSetRef<'v>>,
    matched_attributes: Vec<&'v ConstraintMap>,
    matched_data: Vec<&'v ConstraintMap>,
    matched_pointers: Vec<&'v BlockConstraint>,
    declared_attributes: BTreeSet<String>,
}

struct RemovalCandidate {
    index: usize,
    cascade: Vec<ValidationResult>,
}

impl Validator {
    /// Modify the document to remove non-conforming parts where possible
    /// and report everything that could not be fixed.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures are returned as errors; findings are
    /// part of the result list.
    pub fn prune(&self, document: &mut Document) -> Result<Vec<ValidationResult>> {
        let html_fn = |policy: &str, value: &str| self.validate_html(policy, value);
        let enum_fn =
            |name: &str, value: &str| self.enums.valid_value(name, value).map(|d| d.cloned());
        let ctx = ValueContext {
            html: &html_fn,
            enums: &enum_fn,
        };

        let mut res = Vec::new();

        if let Err(err) = Uuid::parse_str(&document.uuid) {
            res.push(ValidationResult::entity_error(
                EntityRef::attribute("uuid"),
                format!("not a valid UUID: {err}"),
            ));
        }

        let mut declared = false;
        let mut block_constraints: Vec<ConstraintSetRef<'_>> = Vec::new();
        let mut attribute_constraints: Vec<&ConstraintMap> = Vec::new();

        for constraint in &self.documents {
            let mode = constraint.matches(document, &ctx, &ValueDiscarder);

            if mode == Match::None {
                continue;
            }

            if mode == Match::Declaration {
                declared = true;
            }

            block_constraints.push(ConstraintSetRef::Document(constraint));
            attribute_constraints.push(&constraint.attributes);
        }

        if !declared {
            res.push(ValidationResult::error(format!(
                "undeclared document type {:?}",
                document.doc_type
            )));
        }

        res.extend(prune_document_attributes(
            &attribute_constraints,
            document,
            &ctx,
        ));

        for kind in BlockKind::ALL {
            let mut blocks = std::mem::take(document.blocks_mut(kind));

            // At document level failures are reported instead of
            // cascading, so the status can be ignored here.
            let (_, errs) =
                self.prune_block_slice(&mut blocks, kind, &block_constraints, &ctx, true)?;

            *document.blocks_mut(kind) = blocks;

            res.extend(errs);
        }

        Ok(res)
    }

    /// Prune a sibling sequence, removing invalid blocks where the count
    /// constraints allow it.
    fn prune_block_slice<'v>(
        &'v self,
        blocks: &mut Vec<Block>,
        kind: BlockKind,
        constraint_sets: &[ConstraintSetRef<'v>],
        ctx: &ValueContext<'_>,
        document_level: bool,
    ) -> Result<(PruneStatus, Vec<ValidationResult>)> {
        if blocks.is_empty() {
            return Ok((PruneStatus::Keep, Vec::new()));
        }

        // Phase 1: match all blocks against the constraints.
        let mut counts: HashMap<ConstraintKey, usize> = HashMap::new();

        let mut match_infos: Vec<BlockMatchInfo<'v>> = blocks
            .iter()
            .map(|block| match_block(block, kind, constraint_sets, &mut counts))
            .collect();

        // Phase 2: repair each block, queuing unrepairable ones for
        // removal.
        let mut removals: Vec<RemovalCandidate> = Vec::new();
        let mut res: Vec<ValidationResult> = Vec::new();

        for (i, info) in match_infos.iter_mut().enumerate() {
            if !info.defined {
                removals.push(RemovalCandidate {
                    index: i,
                    cascade: vec![ValidationResult::error("undeclared block type or rel")],
                });

                continue;
            }

            let (status, errs) = self.prune_block(&mut blocks[i], info, ctx)?;

            if status == PruneStatus::RemoveMe {
                removals.push(RemovalCandidate {
                    index: i,
                    cascade: errs,
                });

                continue;
            }

            res.extend(errs);
        }

        // Phase 3: check each queued removal against the count
        // constraints of every matching constraint.
        let mut removal_delta: HashMap<ConstraintKey, usize> = HashMap::new();

        for removal in &removals {
            for pointer in &match_infos[removal.index].matched_pointers {
                *removal_delta.entry(ConstraintKey::of(pointer)).or_insert(0) += 1;
            }
        }

        let mut allowed: Vec<usize> = Vec::new();
        let mut forbidden: Vec<RemovalCandidate> = Vec::new();

        for removal in removals {
            let not_allowed = match_infos[removal.index]
                .matched_pointers
                .iter()
                .any(|pointer| {
                    let key = ConstraintKey::of(pointer);
                    let remaining = counts[&key] - removal_delta[&key];

                    !removal_allowed(pointer, remaining)
                });

            if not_allowed {
                forbidden.push(removal);
            } else {
                allowed.push(removal.index);
            }
        }

        // Forbidden removals cascade at nested levels and are reported at
        // the document level.
        for mut removal in forbidden {
            let entity = EntityRef::block(kind, removal.index, &blocks[removal.index]);

            for err in &mut removal.cascade {
                err.entity.push(entity.clone());
            }

            if document_level {
                res.extend(removal.cascade);
            } else {
                return Ok((PruneStatus::RemoveMe, removal.cascade));
            }
        }

        // Execute the allowed removals backwards for index stability.
        allowed.sort_unstable();

        for index in allowed.into_iter().rev() {
            blocks.remove(index);
        }

        // Phase 4: trim blocks that exceed a count or maxCount limit,
        // keeping the first N matches per constraint.
        prune_excess_blocks(blocks, kind, constraint_sets);

        // Phase 5: recount from scratch and report remaining count
        // violations.
        let final_counts = count_block_matches(blocks, kind, constraint_sets);

        for set in constraint_sets {
            for constraint in set.block_constraints(kind) {
                let count = final_counts
                    .get(&ConstraintKey::of(constraint))
                    .copied()
                    .unwrap_or(0);

                let min_ok = constraint.min_count.map_or(true, |min| count >= min);
                let exact_ok = constraint.count.map_or(true, |want| count == want);

                if !min_ok || !exact_ok {
                    let err = ValidationResult::error(
                        constraint.describe_count_constraint(kind),
                    );

                    if document_level {
                        res.push(err);
                    } else {
                        return Ok((PruneStatus::RemoveMe, vec![err]));
                    }
                }
            }
        }

        Ok((PruneStatus::Keep, res))
    }

    /// Prune a single block's attributes, data, and child blocks.
    fn prune_block<'v>(
        &'v self,
        block: &mut Block,
        info: &mut BlockMatchInfo<'v>,
        ctx: &ValueContext<'_>,
    ) -> Result<(PruneStatus, Vec<ValidationResult>)> {
        let mut res = Vec::new();

        let (status, errs) = prune_block_attributes(
            &info.matched_attributes,
            block,
            ctx,
            &mut info.declared_attributes,
        );

        if status == PruneStatus::RemoveMe {
            return Ok((PruneStatus::RemoveMe, errs));
        }

        res.extend(errs);

        let (status, errs) = prune_block_data(block, &info.matched_data, ctx);

        if status == PruneStatus::RemoveMe {
            return Ok((PruneStatus::RemoveMe, errs));
        }

        res.extend(errs);

        for kind in BlockKind::ALL {
            let mut children = std::mem::take(block.blocks_mut(kind));

            let outcome = self.prune_block_slice(
                &mut children,
                kind,
                &info.matched_constraints,
                ctx,
                false,
            )?;

            *block.blocks_mut(kind) = children;

            let (status, errs) = outcome;

            if status == PruneStatus::RemoveMe {
                return Ok((PruneStatus::RemoveMe, errs));
            }

            res.extend(errs);
        }

        Ok((PruneStatus::Keep, res))
    }
}

/// Match a single block against the constraint sets and record the match
/// counts.
fn match_block<'v>(
    block: &Block,
    kind: BlockKind,
    constraint_sets: &[ConstraintSetRef<'v>],
    counts: &mut HashMap<ConstraintKey, usize>,
) -> BlockMatchInfo<'v> {
    let mut info = BlockMatchInfo {
        defined: false,
        matched_constraints: Vec::new(),
        matched_attributes: Vec::new(),
        matched_data: Vec::new(),
        matched_pointers: Vec::new(),
        declared_attributes: BTreeSet::new(),
    };

    for set in constraint_sets {
        for constraint in set.block_constraints(kind) {
            let (mode, attributes) = constraint.matches(block);

            if mode == Match::None {
                continue;
            }

            if mode == Match::Declaration {
                info.defined = true;
            }

            for name in attributes {
                info.declared_attributes.insert(name.to_string());
            }

            *counts.entry(ConstraintKey::of(constraint)).or_insert(0) += 1;

            info.matched_pointers.push(constraint);
            info.matched_constraints.push(ConstraintSetRef::Block(constraint));
            info.matched_attributes.push(&constraint.attributes);
            info.matched_data.push(&constraint.data);
        }
    }

    info
}

/// Whether removing one block matching this constraint is safe given the
/// count remaining after all planned removals.
fn removal_allowed(constraint: &BlockConstraint, remaining: usize) -> bool {
    if constraint.count.is_some_and(|want| remaining < want) {
        return false;
    }

    if constraint.min_count.is_some_and(|min| remaining < min) {
        return false;
    }

    true
}

/// The upper limit a constraint puts on matching blocks, if any.
fn constraint_max_allowed(constraint: &BlockConstraint) -> Option<usize> {
    match (constraint.count, constraint.max_count) {
        (Some(count), Some(max)) => Some(count.min(max)),
        (Some(count), None) => Some(count),
        (None, Some(max)) => Some(max),
        (None, None) => None,
    }
}

/// Remove blocks that exceed a constraint's count or maxCount, keeping
/// the first N matching blocks per constraint.
fn prune_excess_blocks(
    blocks: &mut Vec<Block>,
    kind: BlockKind,
    constraint_sets: &[ConstraintSetRef<'_>],
) {
    let mut to_remove: HashSet<usize> = HashSet::new();

    for set in constraint_sets {
        for constraint in set.block_constraints(kind) {
            let Some(limit) = constraint_max_allowed(constraint) else {
                continue;
            };

            let matching: Vec<usize> = blocks
                .iter()
                .enumerate()
                .filter(|(i, block)| {
                    !to_remove.contains(i) && constraint.matches(block).0 != Match::None
                })
                .map(|(i, _)| i)
                .collect();

            if matching.len() <= limit {
                continue;
            }

            to_remove.extend(matching.into_iter().skip(limit));
        }
    }

    if to_remove.is_empty() {
        return;
    }

    let mut removals: Vec<usize> = to_remove.into_iter().collect();

    removals.sort_unstable();

    for index in removals.into_iter().rev() {
        blocks.remove(index);
    }
}

/// Count how many blocks in the sequence match each constraint.
fn count_block_matches(
    blocks: &[Block],
    kind: BlockKind,
    constraint_sets: &[ConstraintSetRef<'_>],
) -> HashMap<ConstraintKey, usize> {
    let mut counts = HashMap::new();

    for block in blocks {
        for set in constraint_sets {
            for constraint in set.block_constraints(kind) {
                if constraint.matches(block).0 != Match::None {
                    *counts.entry(ConstraintKey::of(constraint)).or_insert(0) += 1;
                }
            }
        }
    }

    counts
}

/// Repair block attributes. Invalid values that may be empty are cleared,
/// undeclared non-empty attributes are cleared, and an invalid required
/// attribute makes the block unrepairable.
fn prune_block_attributes(
    constraints: &[&ConstraintMap],
    block: &mut Block,
    ctx: &ValueContext<'_>,
    declared_attributes: &mut BTreeSet<String>,
) -> (PruneStatus, Vec<ValidationResult>) {
    for map in constraints {
        for (key, check) in map.iter() {
            declared_attributes.insert(key.to_string());

            let value = block.attribute(key);
            let exists = value.is_some();
            let value = value.unwrap_or_default();

            let mut check = check.clone();

            // Mirror validation: optional attributes allow empty.
            check.allow_empty = check.allow_empty || check.optional;

            let Err(err) = check.validate(value, exists, Some(ctx)) else {
                continue;
            };

            if check.allow_empty || check.optional {
                block.set_attribute(key, "");

                continue;
            }

            // A required attribute with an invalid value can't be fixed.
            return (
                PruneStatus::RemoveMe,
                vec![ValidationResult::entity_error(
                    EntityRef::attribute(key),
                    err,
                )],
            );
        }
    }

    for name in ALL_BLOCK_ATTRIBUTES {
        if declared_attributes.contains(name) {
            continue;
        }

        if block.attribute(name).is_some_and(|v| !v.is_empty()) {
            block.set_attribute(name, "");
        }
    }

    (PruneStatus::Keep, Vec::new())
}

/// Repair the data map. Unknown keys are deleted, invalid optional keys
/// are deleted, invalid allow-empty keys are cleared, and an invalid or
/// missing required key makes the block unrepairable.
fn prune_block_data(
    block: &mut Block,
    constraints: &[&ConstraintMap],
    ctx: &ValueContext<'_>,
) -> (PruneStatus, Vec<ValidationResult>) {
    let mut known: HashSet<String> = HashSet::new();

    for map in constraints {
        for (key, check) in map.iter() {
            let value = block.data.get(key).cloned();

            if value.is_some() {
                known.insert(key.to_string());
            }

            if value.is_none() && !check.optional {
                return (
                    PruneStatus::RemoveMe,
                    vec![ValidationResult::entity_error(
                        EntityRef::data(key),
                        "missing required attribute",
                    )],
                );
            }

            let Some(value) = value else { continue };

            let Err(err) = check.validate(&value, true, Some(ctx)) else {
                continue;
            };

            if check.allow_empty {
                block.data.insert(key.to_string(), String::new());

                continue;
            }

            if check.optional {
                block.data.remove(key);

                continue;
            }

            return (
                PruneStatus::RemoveMe,
                vec![ValidationResult::entity_error(EntityRef::data(key), err)],
            );
        }
    }

    block.data.retain(|key, _| known.contains(key));

    (PruneStatus::Keep, Vec::new())
}

/// Repair document-level attributes. There is no cascade at the root, so
/// unfixable values are reported directly.
fn prune_document_attributes(
    constraints: &[&ConstraintMap],
    document: &mut Document,
    ctx: &ValueContext<'_>,
) -> Vec<ValidationResult> {
    let mut res = Vec::new();

    for map in constraints {
        for (key, check) in map.iter() {
            let value = document.attribute(key);
            let exists = value.is_some();
            let value = value.unwrap_or_default();

            let Err(err) = check.validate(value, exists, Some(ctx)) else {
                continue;
            };

            if check.allow_empty || check.optional {
                document.set_attribute(key, "");

                continue;
            }

            res.push(ValidationResult::entity_error(
                EntityRef::attribute(key),
                err,
            ));
        }
    }

    res
}
