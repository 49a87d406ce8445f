//! Free-variable classification.
//!
//! One post-order pass fills `is_external` and `is_constant` on every node of
//! a query, then a second top-down pass collects the maximal external
//! subtrees that the binder must evaluate in the calling scope.
//!
//! A name is local when an enclosing `for` clause binds it. A clause's
//! iterable is visited before its target is bound, so `for x in x.items`
//! reads the outer `x`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::functions::FunctionRegistry;
use crate::tree::{Comprehension, ExprNode, NodeKind, QueryRoot};
use crate::types::Value;

/// A classified query together with its extraction set.
#[derive(Debug, Clone)]
pub struct Classified {
    pub root: QueryRoot,
    /// Maximal external subtrees keyed by their source text.
    pub extracted: BTreeMap<String, ExprNode>,
}

/// Classify a copy of `root`.
pub fn classify(root: &QueryRoot, functions: &FunctionRegistry) -> CompileResult<Classified> {
    let mut root = root.clone();
    let extracted = classify_in_place(&mut root, functions)?;
    Ok(Classified { root, extracted })
}

/// Annotate `root` in place and return its extraction set.
pub fn classify_in_place(
    root: &mut QueryRoot,
    functions: &FunctionRegistry,
) -> CompileResult<BTreeMap<String, ExprNode>> {
    let mut classifier = Classifier {
        functions,
        scopes: Vec::new(),
    };
    classifier.scopes.push(BTreeSet::new());
    classifier.comprehension(&mut root.comprehension, false)?;
    // Order keys see every clause target.
    for clause in &root.comprehension.clauses {
        classifier.bind(&clause.target);
    }
    for key in &mut root.order_by {
        classifier.visit(&mut key.expr)?;
    }
    classifier.scopes.pop();

    let mut extracted = BTreeMap::new();
    for clause in &root.comprehension.clauses {
        collect(&clause.iter, &mut extracted);
        for cond in &clause.conditions {
            collect(cond, &mut extracted);
        }
    }
    collect(&root.comprehension.elt, &mut extracted);
    for key in &root.order_by {
        collect(&key.expr, &mut extracted);
    }
    debug!(extracted = extracted.len(), "classified query");
    Ok(extracted)
}

struct Classifier<'a> {
    functions: &'a FunctionRegistry,
    scopes: Vec<BTreeSet<String>>,
}

impl Classifier<'_> {
    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    /// Visit clauses and element; the caller owns the scope when `own_scope`
    /// is false.
    fn comprehension(&mut self, comp: &mut Comprehension, own_scope: bool) -> CompileResult<()> {
        if comp.clauses.is_empty() {
            return Err(CompileError::malformed("comprehension without a for clause"));
        }
        if own_scope {
            self.scopes.push(BTreeSet::new());
        }
        for clause in &mut comp.clauses {
            if clause.target.is_empty() || clause.target.starts_with("__") {
                return Err(CompileError::malformed(format!(
                    "illegal loop variable '{}'",
                    clause.target
                )));
            }
            self.visit(&mut clause.iter)?;
            self.bind(&clause.target);
            for cond in &mut clause.conditions {
                self.visit(cond)?;
            }
        }
        self.visit(&mut comp.elt)?;
        if own_scope {
            self.scopes.pop();
        }
        Ok(())
    }

    fn visit(&mut self, node: &mut ExprNode) -> CompileResult<()> {
        let (external, constant) = match &mut node.kind {
            NodeKind::Name(id) => (!self.is_local(id), false),
            NodeKind::Constant(_) => (true, true),
            NodeKind::Comprehension(comp) => {
                self.comprehension(comp, true)?;
                (false, false)
            }
            NodeKind::Call {
                func,
                args,
                keywords,
            } => {
                self.visit(func)?;
                for arg in args.iter_mut() {
                    self.visit(arg)?;
                }
                for kw in keywords.iter_mut() {
                    self.visit(&mut kw.value)?;
                }
                let qualified = if func.is_external() {
                    func.dotted_name()
                } else {
                    None
                };
                let all_external = func.is_external()
                    && args.iter().all(ExprNode::is_external)
                    && keywords.iter().all(|k| k.value.is_external());
                let all_constant = args.iter().all(ExprNode::is_constant)
                    && keywords.iter().all(|k| k.value.is_constant());
                match qualified {
                    Some(name) if self.functions.contains(&name) => (false, false),
                    Some(name) if self.functions.is_const_function(&name) => {
                        (all_external, all_external && all_constant)
                    }
                    _ => (all_external, false),
                }
            }
            _ => {
                let mut children = children_mut(node);
                for child in children.iter_mut() {
                    self.visit(child)?;
                }
                let external = !children.is_empty() && children.iter().all(|c| c.is_external());
                let constant = external && children.iter().all(|c| c.is_constant());
                (external, constant)
            }
        };
        node.is_external = Some(external);
        node.is_constant = Some(constant);
        Ok(())
    }
}

/// Mutable children of non-scoping composite nodes.
fn children_mut(node: &mut ExprNode) -> Vec<&mut ExprNode> {
    match &mut node.kind {
        NodeKind::Attribute { value, .. } => vec![value.as_mut()],
        NodeKind::Compare {
            left, comparators, ..
        } => std::iter::once(left.as_mut())
            .chain(comparators.iter_mut())
            .collect(),
        NodeKind::BoolOp { values, .. } => values.iter_mut().collect(),
        NodeKind::BinOp { left, right, .. } => vec![left.as_mut(), right.as_mut()],
        NodeKind::UnaryOp { operand, .. } => vec![operand.as_mut()],
        NodeKind::Tuple(items) | NodeKind::List(items) => items.iter_mut().collect(),
        NodeKind::Starred(inner) | NodeKind::FormattedValue(inner) => vec![inner.as_mut()],
        NodeKind::Name(_)
        | NodeKind::Constant(_)
        | NodeKind::Call { .. }
        | NodeKind::Comprehension(_) => Vec::new(),
    }
}

/// Collect maximal extractable external subtrees.
fn collect(node: &ExprNode, out: &mut BTreeMap<String, ExprNode>) {
    if let NodeKind::Constant(value) = &node.kind {
        // `None` is compared with IS NULL and never bound.
        if *value != Value::Null {
            out.entry(node.source()).or_insert_with(|| node.clone());
        }
        return;
    }
    if node.is_external() && !node.is_extractable() {
        for child in node.children() {
            collect(child, out);
        }
        return;
    }
    if node.is_constant() {
        // Evaluated in place by the translator.
        return;
    }
    if node.is_external() {
        out.entry(node.source()).or_insert_with(|| node.clone());
        return;
    }
    match &node.kind {
        NodeKind::Call {
            func,
            args,
            keywords,
        } => {
            if !func.is_external() {
                collect(func, out);
            }
            for arg in args {
                collect(arg, out);
            }
            for kw in keywords {
                if !kw.value.is_constant() {
                    collect(&kw.value, out);
                }
            }
        }
        _ => {
            for child in node.children() {
                collect(child, out);
            }
        }
    }
}
