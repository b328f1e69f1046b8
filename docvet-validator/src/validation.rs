//! Constraint compilation and document validation
//!
//! `Validator::new` compiles constraint sets into an immutable validator:
//! block references are resolved, document declarations are checked for
//! uniqueness, and HTML policies and enums are merged. The compiled
//! validator can then be shared freely and run against any number of
//! documents concurrently.

use docvet_core::{Block, BlockKind, Document, DocvetError, Result, ALL_BLOCK_ATTRIBUTES};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::block_constraint::{BlockConstraint, BlockSignature, Match};
use crate::deprecation::{
    Deprecation, DeprecationContext, DeprecationDecision, DeprecationHandlerFn,
};
use crate::document_constraint::DocumentConstraint;
use crate::enums::EnumSet;
use crate::html::{HtmlPolicy, HtmlPolicySet};
use crate::result::{
    EntityRef, ValidationResult, ValueAnnotation, ValueCollector, ValueDiscarder,
};
use crate::schema::ConstraintSet;
use crate::string_constraint::{ConstraintMap, StringConstraint, ValueContext};

/// Options for a single validation call.
#[derive(Clone, Default)]
pub struct ValidationOptions {
    value_collector: Option<Arc<dyn ValueCollector>>,
    deprecation_handler: Option<Arc<DeprecationHandlerFn>>,
}

impl ValidationOptions {
    /// Create empty options: annotations are discarded and deprecations
    /// are not dispatched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect value annotations with the given collector.
    #[must_use]
    pub fn with_value_collector(mut self, collector: Arc<dyn ValueCollector>) -> Self {
        self.value_collector = Some(collector);

        self
    }

    /// Dispatch encountered deprecations to the given handler.
    #[must_use]
    pub fn with_deprecation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Document, &Deprecation, &DeprecationContext<'_>) -> Result<DeprecationDecision>
            + Send
            + Sync
            + 'static,
    {
        self.deprecation_handler = Some(Arc::new(handler));

        self
    }
}

/// A compiled set of constraints that can validate and prune documents.
#[derive(Debug)]
pub struct Validator {
    constraints: Vec<ConstraintSet>,
    pub(crate) documents: Vec<DocumentConstraint>,
    html_policies: HashMap<String, HtmlPolicy>,
    pub(crate) enums: EnumSet,
}

/// Identity key for count bookkeeping: block constraints are compared by
/// where they live in the compiled tree, not by value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConstraintKey(*const BlockConstraint);

impl ConstraintKey {
    pub(crate) fn of(constraint: &BlockConstraint) -> Self {
        Self(constraint)
    }
}

/// The two providers of block constraint lists: document constraints at
/// the root, block constraints below.
#[derive(Clone, Copy)]
pub(crate) enum ConstraintSetRef<'a> {
    Document(&'a DocumentConstraint),
    Block(&'a BlockConstraint),
}

impl<'a> ConstraintSetRef<'a> {
    pub(crate) fn block_constraints(self, kind: BlockKind) -> &'a [BlockConstraint] {
        match self {
            ConstraintSetRef::Document(document) => document.block_constraints(kind),
            ConstraintSetRef::Block(block) => block.block_constraints(kind),
        }
    }
}

/// A document or a block as a source of child block sequences.
#[derive(Clone, Copy)]
pub(crate) enum BlockSource<'a> {
    Document(&'a Document),
    Block(&'a Block),
}

impl<'a> BlockSource<'a> {
    pub(crate) fn blocks(self, kind: BlockKind) -> &'a [Block] {
        match self {
            BlockSource::Document(document) => document.blocks(kind),
            BlockSource::Block(block) => block.blocks(kind),
        }
    }
}

impl Validator {
    /// Compile constraint sets into a validator.
    ///
    /// # Errors
    ///
    /// Returns a compilation error for invalid sets: duplicate
    /// declarations, unresolvable or circular block references, enum
    /// conflicts, or HTML policy conflicts.
    pub fn new(sets: Vec<ConstraintSet>) -> Result<Validator> {
        let mut directory: HashMap<(BlockKind, String), BlockConstraint> = HashMap::new();
        let mut documents: Vec<DocumentConstraint> = Vec::new();
        let mut declared_types: HashSet<String> = HashSet::new();
        let mut policy_set = HtmlPolicySet::new();
        let mut enums = EnumSet::new();

        for set in &sets {
            set.validate()?;

            for kind in BlockKind::ALL {
                for definition in set.definitions(kind) {
                    let key = (kind, definition.id.clone());

                    if directory.contains_key(&key) {
                        return Err(DocvetError::invalid_set(
                            &set.name,
                            format!(
                                "{kind} blocks: {:?} has already been declared",
                                definition.id
                            ),
                        ));
                    }

                    directory.insert(key, definition.block.clone());
                }
            }

            for document in &set.documents {
                documents.push(document.clone());

                if document.declares.is_empty() {
                    continue;
                }

                if !declared_types.insert(document.declares.clone()) {
                    return Err(DocvetError::RedeclaredDocumentType {
                        doc_type: document.declares.clone(),
                        set: set.name.clone(),
                    });
                }
            }

            policy_set
                .add(&set.name, set.html_policies.iter().cloned())
                .map_err(DocvetError::html_policy)?;

            for e in &set.enums {
                enums.register(e.clone()).map_err(|err| {
                    DocvetError::enums(format!("constraint set {:?}: {err}", set.name))
                })?;
            }
        }

        for (i, document) in documents.iter_mut().enumerate() {
            resolve_document_refs(&directory, document).map_err(|err| {
                DocvetError::block_reference(format!("document {}: {err}", i + 1))
            })?;
        }

        enums.resolve().map_err(DocvetError::enums)?;

        let html_policies = policy_set.resolve().map_err(DocvetError::html_policy)?;

        tracing::debug!(
            sets = sets.len(),
            documents = documents.len(),
            policies = html_policies.len(),
            "compiled validator"
        );

        Ok(Validator {
            constraints: sets,
            documents,
            html_policies,
            enums,
        })
    }

    /// Create a new validator that uses an additional set of constraints.
    ///
    /// # Errors
    ///
    /// Returns a compilation error when the combined sets don't compile.
    pub fn with_constraints(&self, sets: Vec<ConstraintSet>) -> Result<Validator> {
        let mut all = self.constraints.clone();

        all.extend(sets);

        Validator::new(all)
    }

    /// Validate a document, accumulating findings as results.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures are returned as errors; validation
    /// findings are part of the result list.
    pub fn validate_document(
        &self,
        document: &Document,
        options: ValidationOptions,
    ) -> Result<Vec<ValidationResult>> {
        let collector: Arc<dyn ValueCollector> = options
            .value_collector
            .unwrap_or_else(|| Arc::new(ValueDiscarder));
        let handler = options.deprecation_handler.as_deref();

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
            let mode = constraint.matches(document, &ctx, collector.as_ref());

            if mode == Match::None {
                continue;
            }

            if mode == Match::Declaration {
                declared = true;
            }

            check_deprecation(
                handler,
                &mut res,
                document,
                &DeprecationContext::default(),
                &[constraint.deprecated.as_ref()],
            )?;

            block_constraints.push(ConstraintSetRef::Document(constraint));
            attribute_constraints.push(&constraint.attributes);
        }

        if !declared {
            res.push(ValidationResult::error(format!(
                "undeclared document type {:?}",
                document.doc_type
            )));
        }

        self.validate_blocks(
            document,
            BlockSource::Document(document),
            &block_constraints,
            &mut res,
            collector.as_ref(),
            handler,
            &ctx,
        )?;

        validate_document_attributes(
            document,
            &attribute_constraints,
            &mut res,
            collector.as_ref(),
            handler,
            &ctx,
        )?;

        Ok(res)
    }

    pub(crate) fn validate_html(&self, policy_name: &str, value: &str) -> std::result::Result<(), String> {
        let name = if policy_name.is_empty() {
            "default"
        } else {
            policy_name
        };

        let policy = self
            .html_policies
            .get(name)
            .ok_or_else(|| format!("no {name:?} HTML policy defined"))?;

        policy.check(value)
    }

    fn validate_blocks<'v>(
        &'v self,
        document: &Document,
        source: BlockSource<'_>,
        constraints: &[ConstraintSetRef<'v>],
        res: &mut Vec<ValidationResult>,
        collector: &dyn ValueCollector,
        handler: Option<&DeprecationHandlerFn>,
        ctx: &ValueContext<'_>,
    ) -> Result<()> {
        for kind in BlockKind::ALL {
            self.validate_block_slice(
                document,
                source.blocks(kind),
                kind,
                constraints,
                res,
                collector,
                handler,
                ctx,
            )?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_block_slice<'v>(
        &'v self,
        document: &Document,
        blocks: &[Block],
        kind: BlockKind,
        constraints: &[ConstraintSetRef<'v>],
        res: &mut Vec<ValidationResult>,
        collector: &dyn ValueCollector,
        handler: Option<&DeprecationHandlerFn>,
        ctx: &ValueContext<'_>,
    ) -> Result<()> {
        let mut matches: HashMap<ConstraintKey, usize> = HashMap::new();

        for (i, block) in blocks.iter().enumerate() {
            let entity = EntityRef::block(kind, i, block);
            let child_collector = collector.with(entity.clone());

            let mut block_res = Vec::new();

            self.validate_block(
                document,
                block,
                &entity,
                constraints,
                &mut matches,
                &mut block_res,
                child_collector.as_ref(),
                handler,
                ctx,
            )?;

            for result in &mut block_res {
                result.entity.push(entity.clone());
            }

            res.append(&mut block_res);
        }

        for set in constraints {
            for constraint in set.block_constraints(kind) {
                let count = matches
                    .get(&ConstraintKey::of(constraint))
                    .copied()
                    .unwrap_or(0);

                let valid = constraint.count.map_or(true, |want| count == want)
                    && constraint.min_count.map_or(true, |min| count >= min)
                    && constraint.max_count.map_or(true, |max| count <= max);

                if !valid {
                    res.push(ValidationResult::error(
                        constraint.describe_count_constraint(kind),
                    ));
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_block<'v>(
        &'v self,
        document: &Document,
        block: &Block,
        entity: &EntityRef,
        constraint_sets: &[ConstraintSetRef<'v>],
        matches: &mut HashMap<ConstraintKey, usize>,
        res: &mut Vec<ValidationResult>,
        collector: &dyn ValueCollector,
        handler: Option<&DeprecationHandlerFn>,
        ctx: &ValueContext<'_>,
    ) -> Result<()> {
        if !block.uuid.is_empty() {
            if let Err(err) = Uuid::parse_str(&block.uuid) {
                res.push(ValidationResult::entity_error(
                    EntityRef::attribute("uuid"),
                    format!("not a valid UUID: {err}"),
                ));
            }
        }

        let kind = entity.kind.unwrap_or_default();

        let mut defined = false;
        let mut matched_constraints: Vec<ConstraintSetRef<'v>> = Vec::new();
        let mut matched_attributes: Vec<&'v ConstraintMap> = Vec::new();
        let mut matched_data: Vec<&'v ConstraintMap> = Vec::new();
        let mut declared_attributes: BTreeSet<String> = BTreeSet::new();

        for set in constraint_sets {
            for constraint in set.block_constraints(kind) {
                let (mode, attributes) = constraint.matches(block);

                if mode == Match::None {
                    continue;
                }

                if mode == Match::Declaration {
                    defined = true;
                }

                check_deprecation(
                    handler,
                    res,
                    document,
                    &DeprecationContext {
                        entity: Some(entity.clone()),
                        block: Some(block),
                        value: None,
                    },
                    &[constraint.deprecated.as_ref()],
                )?;

                for name in attributes {
                    declared_attributes.insert(name.to_string());
                }

                *matches.entry(ConstraintKey::of(constraint)).or_insert(0) += 1;

                matched_constraints.push(ConstraintSetRef::Block(constraint));
                matched_attributes.push(&constraint.attributes);
                matched_data.push(&constraint.data);
            }
        }

        if !defined {
            res.push(ValidationResult::error("undeclared block type or rel"));
        }

        // Declared signature attributes are emitted as annotations with
        // their value as a literal identity constraint.
        for name in &declared_attributes {
            let value = block.match_attribute(name).unwrap_or_default();

            collector.collect_value(ValueAnnotation {
                refs: vec![EntityRef::attribute(name)],
                constraint: StringConstraint::constant(value),
                value: value.to_string(),
            });
        }

        validate_block_attributes(
            document,
            block,
            &mut declared_attributes,
            &matched_attributes,
            res,
            collector,
            handler,
            ctx,
        )?;

        validate_block_data(
            document,
            block,
            &matched_data,
            res,
            collector,
            handler,
            ctx,
        )?;

        self.validate_blocks(
            document,
            BlockSource::Block(block),
            &matched_constraints,
            res,
            collector,
            handler,
            ctx,
        )?;

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn validate_block_attributes(
    document: &Document,
    block: &Block,
    declared_attributes: &mut BTreeSet<String>,
    constraints: &[&ConstraintMap],
    res: &mut Vec<ValidationResult>,
    collector: &dyn ValueCollector,
    handler: Option<&DeprecationHandlerFn>,
    ctx: &ValueContext<'_>,
) -> Result<()> {
    for map in constraints {
        for (key, check) in map.iter() {
            let value = block.attribute(key);
            let exists = value.is_some();
            let value = value.unwrap_or_default();

            let entity = EntityRef::attribute(key);

            let mut check = check.clone();

            // Optional attributes are empty strings.
            check.allow_empty = check.allow_empty || check.optional;

            let deprecation = match check.validate(value, exists, Some(ctx)) {
                Ok(deprecation) => deprecation,
                Err(err) => {
                    res.push(ValidationResult::entity_error(entity.clone(), err));

                    None
                }
            };

            if !value.is_empty() {
                // Attributes always exist on the model, so deprecations
                // only fire for attributes that carry a value.
                check_deprecation(
                    handler,
                    res,
                    document,
                    &DeprecationContext {
                        entity: Some(entity.clone()),
                        block: Some(block),
                        value: Some(value),
                    },
                    &[check.deprecated.as_ref(), deprecation.as_ref()],
                )?;

                collector.collect_value(ValueAnnotation {
                    refs: vec![entity],
                    constraint: check.clone(),
                    value: value.to_string(),
                });
            }

            declared_attributes.insert(key.to_string());
        }
    }

    for name in ALL_BLOCK_ATTRIBUTES {
        if declared_attributes.contains(name) {
            continue;
        }

        if block.attribute(name).is_some_and(|v| !v.is_empty()) {
            res.push(ValidationResult::entity_error(
                EntityRef::attribute(name),
                "undeclared block attribute",
            ));
        }
    }

    Ok(())
}

fn validate_block_data(
    document: &Document,
    block: &Block,
    constraints: &[&ConstraintMap],
    res: &mut Vec<ValidationResult>,
    collector: &dyn ValueCollector,
    handler: Option<&DeprecationHandlerFn>,
    ctx: &ValueContext<'_>,
) -> Result<()> {
    let mut known: HashSet<String> = HashSet::new();

    for map in constraints {
        for (key, check) in map.iter() {
            let value = block.data.get(key);

            if value.is_some() {
                known.insert(key.to_string());
            }

            let entity = EntityRef::data(key);

            if value.is_none() && !check.optional {
                res.push(ValidationResult::entity_error(
                    entity.clone(),
                    "missing required attribute",
                ));
            }

            let Some(value) = value else { continue };

            let deprecation = match check.validate(value, true, Some(ctx)) {
                Ok(deprecation) => deprecation,
                Err(err) => {
                    res.push(ValidationResult::entity_error(entity.clone(), err));

                    None
                }
            };

            check_deprecation(
                handler,
                res,
                document,
                &DeprecationContext {
                    entity: Some(entity.clone()),
                    block: Some(block),
                    value: Some(value),
                },
                &[check.deprecated.as_ref(), deprecation.as_ref()],
            )?;

            collector.collect_value(ValueAnnotation {
                refs: vec![entity],
                constraint: check.clone(),
                value: value.clone(),
            });
        }
    }

    // The data map iterates in key order, so unknown keys are reported
    // sorted.
    for key in block.data.keys() {
        if !known.contains(key) {
            res.push(ValidationResult::entity_error(
                EntityRef::data(key),
                "unknown attribute",
            ));
        }
    }

    Ok(())
}

fn validate_document_attributes(
    document: &Document,
    constraints: &[&ConstraintMap],
    res: &mut Vec<ValidationResult>,
    collector: &dyn ValueCollector,
    handler: Option<&DeprecationHandlerFn>,
    ctx: &ValueContext<'_>,
) -> Result<()> {
    for map in constraints {
        for (key, check) in map.iter() {
            let value = document.attribute(key);
            let exists = value.is_some();
            let value = value.unwrap_or_default();

            let entity = EntityRef::attribute(key);

            let deprecation = match check.validate(value, exists, Some(ctx)) {
                Ok(deprecation) => deprecation,
                Err(err) => {
                    res.push(ValidationResult::entity_error(entity.clone(), err));

                    None
                }
            };

            if !value.is_empty() {
                check_deprecation(
                    handler,
                    res,
                    document,
                    &DeprecationContext {
                        entity: Some(entity.clone()),
                        block: None,
                        value: Some(value),
                    },
                    &[deprecation.as_ref(), check.deprecated.as_ref()],
                )?;

                collector.collect_value(ValueAnnotation {
                    refs: vec![entity],
                    value: value.to_string(),
                    ..Default::default()
                });
            }
        }
    }

    Ok(())
}

pub(crate) fn check_deprecation(
    handler: Option<&DeprecationHandlerFn>,
    res: &mut Vec<ValidationResult>,
    document: &Document,
    context: &DeprecationContext<'_>,
    deprecations: &[Option<&Deprecation>],
) -> Result<()> {
    let Some(handler) = handler else {
        return Ok(());
    };

    for deprecation in deprecations.iter().flatten() {
        let decision = handler(document, deprecation, context)
            .map_err(|err| DocvetError::deprecation_handler(err.to_string()))?;

        if decision.enforce {
            let message = if decision.message.is_empty() {
                deprecation.doc.clone()
            } else {
                decision.message
            };

            res.push(ValidationResult {
                entity: context.entity.clone().into_iter().collect(),
                error: format!("enforced deprecation {:?}: {message}", deprecation.label),
                enforced_deprecation: true,
            });
        }
    }

    Ok(())
}

fn resolve_document_refs(
    directory: &HashMap<(BlockKind, String), BlockConstraint>,
    document: &mut DocumentConstraint,
) -> std::result::Result<(), String> {
    let mut stack = Vec::new();

    for kind in BlockKind::ALL {
        resolve_children(
            directory,
            kind,
            document.block_constraints_mut(kind),
            &mut stack,
        )?;
    }

    Ok(())
}

fn resolve_nested(
    directory: &HashMap<(BlockKind, String), BlockConstraint>,
    constraint: &mut BlockConstraint,
    stack: &mut Vec<(BlockKind, String)>,
) -> std::result::Result<(), String> {
    for kind in BlockKind::ALL {
        resolve_children(directory, kind, constraint.block_constraints_mut(kind), stack)?;
    }

    Ok(())
}

/// Resolve `ref`s in one constraint list: a reference is replaced by a
/// copy of the referenced definition, and a non-noop referencing
/// constraint is re-attached as a variant gated on the definition's
/// declared signature.
fn resolve_children(
    directory: &HashMap<(BlockKind, String), BlockConstraint>,
    kind: BlockKind,
    list: &mut Vec<BlockConstraint>,
    stack: &mut Vec<(BlockKind, String)>,
) -> std::result::Result<(), String> {
    let mut resolved: Vec<(BlockConstraint, Option<String>)> = Vec::new();

    for (i, constraint) in list.drain(..).enumerate() {
        if constraint.ref_.is_empty() {
            resolved.push((constraint, None));

            continue;
        }

        let name = constraint.ref_.clone();

        if stack.iter().any(|(k, n)| *k == kind && *n == name) {
            return Err(format!("circular reference to {kind} block {name:?}"));
        }

        let definition = directory.get(&(kind, name.clone())).ok_or_else(|| {
            format!("{kind} block {} references unknown block {name:?}", i + 1)
        })?;

        resolved.push((definition.clone(), Some(name)));

        let mut payload = constraint;

        payload.ref_.clear();

        if !payload.is_noop() {
            payload.match_ = definition
                .declares
                .as_ref()
                .map_or_else(ConstraintMap::default, BlockSignature::as_constraint);

            resolved.push((payload, None));
        }
    }

    for (i, (constraint, source)) in resolved.iter_mut().enumerate() {
        if let Some(name) = source {
            stack.push((kind, name.clone()));
        }

        let outcome = resolve_nested(directory, constraint, stack);

        if source.is_some() {
            stack.pop();
        }

        outcome.map_err(|err| format!("{kind} block {}: {err}", i + 1))?;
    }

    *list = resolved.into_iter().map(|(constraint, _)| constraint).collect();

    Ok(())
}
