//! Built-in function calls, value methods and aggregates.

use crate::bind::{evaluate, Scope};
use crate::error::{CompileError, CompileResult};
use crate::functions::{ArgDomain, FunctionDescriptor, FunctionKind, ReturnType};
use crate::sql::dialect::SqlDialect;
use crate::sql::expr::{aggregate, case_when, count_star, func, lit_float, lit_int, lit_str, Expr};
use crate::sql::token::TokenStream;
use crate::tree::{ExprNode, Keyword, NodeKind};
use crate::types::{coerce, Value, ValueType};

use super::typed::{Repr, TypedNode};
use super::Translator;

const DEFAULT_SEPARATOR: &str = ",";

impl<'a> Translator<'a> {
    pub(super) fn call(
        &mut self,
        callee: &ExprNode,
        args: &[ExprNode],
        keywords: &[Keyword],
    ) -> CompileResult<TypedNode> {
        if args.iter().any(|a| matches!(a.kind, NodeKind::Starred(_))) {
            return Err(CompileError::malformed(
                "starred arguments cannot be expanded inside a query",
            ));
        }
        // `p.name.upper()`: a method of a translated value.
        if let NodeKind::Attribute { value, attr } = &callee.kind {
            if !callee.is_external() {
                let receiver = self.node(value)?;
                return self.method(receiver, attr, args, keywords);
            }
        }
        let name = callee.dotted_name().ok_or_else(|| {
            CompileError::malformed(format!("cannot call a {}", callee.kind_name()))
        })?;
        let functions = self.functions;
        let descriptor = functions
            .lookup(&name)
            .ok_or_else(|| CompileError::UnknownFunction {
                name: name.clone(),
                expr: String::new(),
            })?;
        self.builtin(descriptor, args, keywords)
    }

    fn builtin(
        &mut self,
        desc: &'a FunctionDescriptor,
        args: &[ExprNode],
        keywords: &[Keyword],
    ) -> CompileResult<TypedNode> {
        if !desc.accepts_arity(args.len()) {
            return Err(arity_error(desc, args.len()));
        }
        match desc.kind {
            FunctionKind::Scalar => {
                reject_keywords(desc, keywords, &[])?;
                self.scalar_call(desc, desc.sql_name, &desc.returns, args)
            }
            FunctionKind::Extract(part) => {
                reject_keywords(desc, keywords, &[])?;
                let arg = self.node(first(desc, args)?)?;
                self.extract(arg, part)
            }
            FunctionKind::Aggregate if args.len() > 1 => {
                reject_keywords(desc, keywords, &[])?;
                match desc.scalar_variant {
                    // min(a, b) and max(a, b) compare their arguments.
                    Some(variant) => self.scalar_call(desc, variant, &ReturnType::Common, args),
                    None => Err(arity_error(desc, args.len())),
                }
            }
            FunctionKind::Count if args.is_empty() => {
                reject_keywords(desc, keywords, &[])?;
                Ok(TypedNode::sql(ValueType::INT, count_star()).aggregated(true))
            }
            FunctionKind::Aggregate
            | FunctionKind::Count
            | FunctionKind::OrderedSet
            | FunctionKind::StringAgg => {
                let allowed: &[&str] = if desc.kind == FunctionKind::StringAgg {
                    &["distinct", "sep"]
                } else {
                    &["distinct"]
                };
                reject_keywords(desc, keywords, allowed)?;
                let arg = self.node(first(desc, args)?)?;
                self.aggregate_call(desc, arg, &args[1..], keywords)
            }
            FunctionKind::Exists => {
                reject_keywords(desc, keywords, &[])?;
                let arg = self.node(first(desc, args)?)?;
                let expr = self.exists(&arg, false)?;
                Ok(TypedNode::sql(ValueType::BOOL, expr))
            }
        }
    }

    fn scalar_call(
        &mut self,
        desc: &FunctionDescriptor,
        sql_name: &str,
        returns: &ReturnType,
        args: &[ExprNode],
    ) -> CompileResult<TypedNode> {
        let nodes = self.nodes(args)?;
        let mut exprs = Vec::with_capacity(nodes.len());
        for node in &nodes {
            if node.is_set() {
                return Err(CompileError::type_mismatch(format!(
                    "{}() cannot take {}",
                    desc.name, node.value_type
                )));
            }
            check_domain(desc, &node.value_type)?;
            exprs.push(if desc.domain == ArgDomain::Numeric {
                self.numeric_operand(node)?
            } else {
                self.scalar(node)?
            });
        }
        let types: Vec<ValueType> = nodes.iter().map(|n| n.value_type.clone()).collect();
        let value_type = return_type(desc, returns, &types)?;
        Ok(TypedNode::sql(value_type, func(sql_name, exprs)).derived_from(&nodes))
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Aggregate over the current scope's rows, or over a collection or
    /// sub-query as a correlated scalar sub-query.
    fn aggregate_call(
        &mut self,
        desc: &'a FunctionDescriptor,
        arg: TypedNode,
        extra: &[ExprNode],
        keywords: &[Keyword],
    ) -> CompileResult<TypedNode> {
        let distinct = self.keyword_flag(keywords, "distinct")?;
        let nullable = desc.kind != FunctionKind::Count;

        if arg.is_set() {
            let (scope, elt) = self.subquery_source(&arg)?;
            if elt.aggregated {
                return Err(CompileError::ambiguous(format!(
                    "{}() over a sub-query that is already aggregated",
                    desc.name
                )));
            }
            let (expr, value_type) = self.aggregate_expr(desc, &elt, extra, keywords, distinct)?;
            let query = self.scope_query(scope).select(vec![expr]);
            return Ok(TypedNode::sql(value_type, Expr::Subquery(Box::new(query))).nullable(nullable));
        }

        if arg.aggregated {
            return Err(CompileError::ambiguous(format!(
                "{}() of an aggregated value",
                desc.name
            )));
        }
        let (expr, value_type) = self.aggregate_expr(desc, &arg, extra, keywords, distinct)?;
        Ok(TypedNode::sql(value_type, expr)
            .nullable(nullable)
            .aggregated(true))
    }

    fn aggregate_expr(
        &mut self,
        desc: &FunctionDescriptor,
        arg: &TypedNode,
        extra: &[ExprNode],
        keywords: &[Keyword],
        distinct: Option<bool>,
    ) -> CompileResult<(Expr, ValueType)> {
        match desc.kind {
            FunctionKind::Count => self.count_expr(arg, distinct),
            FunctionKind::OrderedSet => self.ordered_set(desc, arg, extra),
            FunctionKind::StringAgg => self.string_agg(desc, arg, extra, keywords, distinct),
            FunctionKind::Aggregate => {
                check_domain(desc, &arg.value_type)?;
                if desc.is_statistical() && !self.dialect.supports_statistical_aggregates() {
                    return Err(self.unsupported(format!("{}()", desc.name)));
                }
                // sum(flag) counts true values.
                let expr = self.numeric_operand(arg)?;
                let value_type =
                    return_type(desc, &desc.returns, std::slice::from_ref(&arg.value_type))?;
                Ok((
                    aggregate(desc.sql_name, vec![expr], distinct.unwrap_or(false)),
                    value_type,
                ))
            }
            FunctionKind::Scalar | FunctionKind::Extract(_) | FunctionKind::Exists => Err(
                CompileError::malformed(format!("{}() is not an aggregate", desc.name)),
            ),
        }
    }

    /// `count(entity)` counts distinct keys; `count(flag)` counts true rows.
    fn count_expr(&mut self, arg: &TypedNode, distinct: Option<bool>) -> CompileResult<(Expr, ValueType)> {
        let expr = match &arg.repr {
            Repr::Table(id) => {
                let entity = self.registry.table(*id).entity;
                let keys = self.registry.key_columns(*id, self.catalog)?;
                let name = self.catalog.entity_name(entity).to_string();
                self.count_columns(keys, distinct.unwrap_or(true), &name)?
            }
            Repr::Row(_) => {
                let columns = self.columns(arg)?;
                self.count_columns(columns, distinct.unwrap_or(true), "tuple")?
            }
            _ if arg.value_type.is_bool() => {
                let condition = self.as_condition(arg)?;
                aggregate("COUNT", vec![case_when(condition, lit_int(1), None)], false)
            }
            _ => {
                let expr = self.scalar(arg)?;
                aggregate("COUNT", vec![expr], distinct.unwrap_or(false))
            }
        };
        Ok((expr, ValueType::INT))
    }

    fn count_columns(&self, mut columns: Vec<Expr>, distinct: bool, owner: &str) -> CompileResult<Expr> {
        if columns.len() == 1 {
            return Ok(aggregate("COUNT", columns.split_off(0), distinct));
        }
        if !distinct {
            return Ok(count_star());
        }
        if self.dialect.distinct_count_takes_column_list()
            || self.dialect.supports_composite_key_aggregation()
        {
            return Ok(aggregate("COUNT", vec![Expr::Row(columns)], true));
        }
        Err(CompileError::UnsupportedCompositeAggregate {
            entity: owner.to_string(),
            expr: String::new(),
        })
    }

    /// `median`, `quantile` and `mode`.
    fn ordered_set(
        &mut self,
        desc: &FunctionDescriptor,
        arg: &TypedNode,
        extra: &[ExprNode],
    ) -> CompileResult<(Expr, ValueType)> {
        check_domain(desc, &arg.value_type)?;
        let expr = self.scalar(arg)?;
        if desc.sql_name == "MODE" {
            if self.dialect.emit_mode(TokenStream::new()).is_none() {
                return Err(self.unsupported("mode()"));
            }
            return Ok((Expr::Mode(Box::new(expr)), arg.value_type.clone()));
        }
        if !self.dialect.supports_within_group() {
            return Err(self.unsupported(format!("{}()", desc.name)));
        }
        let fraction = match extra.first() {
            Some(node) => {
                let q = self.node(node)?;
                if !q.value_type.is_number() {
                    return Err(CompileError::type_mismatch(format!(
                        "{}() fraction must be a number, not {}",
                        desc.name, q.value_type
                    ))
                    .at(|| node.source()));
                }
                self.scalar(&q)?
            }
            None => lit_float(0.5),
        };
        let value_type = return_type(desc, &desc.returns, std::slice::from_ref(&arg.value_type))?;
        Ok((
            Expr::WithinGroup {
                name: desc.sql_name.to_string(),
                args: vec![fraction],
                order_by: Box::new(expr),
            },
            value_type,
        ))
    }

    fn string_agg(
        &mut self,
        desc: &FunctionDescriptor,
        arg: &TypedNode,
        extra: &[ExprNode],
        keywords: &[Keyword],
        distinct: Option<bool>,
    ) -> CompileResult<(Expr, ValueType)> {
        if !arg.value_type.is_text() {
            return Err(CompileError::type_mismatch(format!(
                "{}() expects strings, not {}",
                desc.name, arg.value_type
            )));
        }
        let expr = self.scalar(arg)?;
        let separator_node = extra
            .first()
            .or_else(|| keywords.iter().find(|k| k.name == "sep").map(|k| &k.value));
        let separator = match separator_node {
            Some(node) => self.separator(node)?,
            None => DEFAULT_SEPARATOR.to_string(),
        };
        Ok((
            Expr::StringAgg {
                expr: Box::new(expr),
                separator: Box::new(lit_str(&separator)),
                distinct: distinct.unwrap_or(false),
            },
            ValueType::Text,
        ))
    }

    /// Separators are spliced into the SQL, so they must be known now.
    fn separator(&self, node: &ExprNode) -> CompileResult<String> {
        match self.constant_argument(node)? {
            Value::Text(s) => Ok(s),
            other => Err(CompileError::type_mismatch(format!(
                "separator must be a string, not {}",
                other.kind_name()
            ))
            .at(|| node.source())),
        }
    }

    fn constant_argument(&self, node: &ExprNode) -> CompileResult<Value> {
        match &node.kind {
            NodeKind::Constant(value) => Ok(value.clone()),
            _ if node.is_constant() => evaluate(node, &Scope::default(), self.catalog),
            _ => Err(CompileError::type_mismatch("argument must be a constant").at(|| node.source())),
        }
    }

    fn keyword_flag(&self, keywords: &[Keyword], name: &str) -> CompileResult<Option<bool>> {
        match keywords.iter().find(|k| k.name == name) {
            Some(keyword) => Ok(Some(self.constant_argument(&keyword.value)?.truthy())),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Methods
    // =========================================================================

    fn method(
        &mut self,
        receiver: TypedNode,
        name: &str,
        args: &[ExprNode],
        keywords: &[Keyword],
    ) -> CompileResult<TypedNode> {
        // `p.cars.count()`, `(c.price for c in p.cars).sum()`
        if receiver.is_set() {
            let functions = self.functions;
            if let Some(desc) = functions.lookup(name) {
                match desc.kind {
                    FunctionKind::Exists if args.is_empty() => {
                        let expr = self.exists(&receiver, false)?;
                        return Ok(TypedNode::sql(ValueType::BOOL, expr));
                    }
                    FunctionKind::Aggregate
                    | FunctionKind::Count
                    | FunctionKind::OrderedSet
                    | FunctionKind::StringAgg => {
                        if !desc.accepts_arity(args.len() + 1) {
                            return Err(arity_error(desc, args.len() + 1));
                        }
                        return self.aggregate_call(desc, receiver, args, keywords);
                    }
                    _ => {}
                }
            }
        }

        if receiver.value_type.is_text() {
            let text_function = match name {
                "upper" => Some("UPPER"),
                "lower" => Some("LOWER"),
                "strip" => Some("TRIM"),
                "lstrip" => Some("LTRIM"),
                "rstrip" => Some("RTRIM"),
                _ => None,
            };
            if let Some(sql_name) = text_function {
                if !args.is_empty() {
                    return Err(CompileError::type_mismatch(format!(
                        "str.{name}() takes no arguments in a query"
                    )));
                }
                let expr = self.scalar(&receiver)?;
                return Ok(TypedNode::sql(ValueType::Text, func(sql_name, vec![expr]))
                    .derived_from([&receiver]));
            }
            if name == "startswith" || name == "endswith" {
                return self.affix_match(receiver, name == "startswith", args);
            }
        }

        Err(CompileError::UnknownFunction {
            name: format!("{}.{}", receiver.value_type, name),
            expr: String::new(),
        })
    }

    fn affix_match(&mut self, receiver: TypedNode, prefix: bool, args: &[ExprNode]) -> CompileResult<TypedNode> {
        let [arg] = args else {
            return Err(CompileError::type_mismatch(format!(
                "{}() takes exactly one argument ({} given)",
                if prefix { "startswith" } else { "endswith" },
                args.len()
            )));
        };
        let needle = self.node(arg)?;
        if !needle.value_type.is_text() {
            return Err(CompileError::type_mismatch(format!(
                "expected a str argument, not {}",
                needle.value_type
            ))
            .at(|| arg.source()));
        }
        let subject = self.scalar(&receiver)?;
        let (pattern, escape) = self.like_pattern(&needle, !prefix, prefix)?;
        Ok(TypedNode::sql(
            ValueType::BOOL,
            Expr::Like {
                expr: Box::new(subject),
                pattern: Box::new(pattern),
                escape,
                negated: false,
            },
        )
        .derived_from([&receiver, &needle]))
    }
}

fn first<'n>(desc: &FunctionDescriptor, args: &'n [ExprNode]) -> CompileResult<&'n ExprNode> {
    args.first().ok_or_else(|| arity_error(desc, 0))
}

fn arity_error(desc: &FunctionDescriptor, given: usize) -> CompileError {
    let expected = match desc.max_args {
        Some(max) if max == desc.min_args => format!("exactly {max}"),
        Some(max) => format!("{} to {max}", desc.min_args),
        None => format!("at least {}", desc.min_args),
    };
    CompileError::type_mismatch(format!(
        "{}() takes {expected} arguments ({given} given)",
        desc.name
    ))
}

fn reject_keywords(desc: &FunctionDescriptor, keywords: &[Keyword], allowed: &[&str]) -> CompileResult<()> {
    match keywords.iter().find(|k| !allowed.contains(&k.name.as_str())) {
        Some(keyword) => Err(CompileError::type_mismatch(format!(
            "{}() got an unexpected keyword argument '{}'",
            desc.name, keyword.name
        ))),
        None => Ok(()),
    }
}

fn check_domain(desc: &FunctionDescriptor, value_type: &ValueType) -> CompileResult<()> {
    if desc.domain.accepts(value_type) {
        Ok(())
    } else {
        Err(CompileError::type_mismatch(format!(
            "{}() expects {}, not {}",
            desc.name,
            desc.domain.describe(),
            value_type
        )))
    }
}

fn return_type(desc: &FunctionDescriptor, returns: &ReturnType, args: &[ValueType]) -> CompileResult<ValueType> {
    match returns {
        ReturnType::Argument => Ok(match args.first() {
            Some(t) if t.is_bool() => ValueType::INT,
            Some(t) => t.clone(),
            None => ValueType::Null,
        }),
        ReturnType::Common => args.iter().try_fold(ValueType::Null, |acc, t| {
            coerce(&acc, t).ok_or_else(|| {
                CompileError::type_mismatch(format!(
                    "{}() arguments {} and {} have no common type",
                    desc.name, acc, t
                ))
            })
        }),
        ReturnType::Fixed(t) => Ok(t.clone()),
    }
}
