use super::{BoundRef, Condition, Expr, Literal, Operator, PathKind};
use crate::choices::{ChoiceTree, ContextValue};
use crate::error::{ArchetypeError, Result};

impl Condition {
    /// Evaluate against the current choices, short-circuiting `&&` and `||`
    /// left to right.
    ///
    /// An error here means a stored value contradicts the declared kind of
    /// its input, which binding should have made impossible.
    pub fn eval(&self, tree: &ChoiceTree) -> Result<bool> {
        eval_expr(self.expr(), tree)
    }
}

fn eval_expr(expr: &Expr<BoundRef>, tree: &ChoiceTree) -> Result<bool> {
    match expr {
        Expr::Exists(r) => exists(r, tree),
        Expr::Compare { path, op, literal } => match op {
            Operator::Eq => equals(path, literal, tree),
            Operator::Ne => equals(path, literal, tree).map(|eq| !eq),
            Operator::Contains => contains(path, literal, tree),
        },
        Expr::Not(inner) => eval_expr(inner, tree).map(|b| !b),
        Expr::And(l, r) => {
            if !eval_expr(l, tree)? {
                return Ok(false);
            }
            eval_expr(r, tree)
        }
        Expr::Or(l, r) => {
            if eval_expr(l, tree)? {
                return Ok(true);
            }
            eval_expr(r, tree)
        }
    }
}

fn evaluation_error(r: &BoundRef, reason: String) -> ArchetypeError {
    ArchetypeError::ExpressionEvaluation {
        path: r.path.to_string(),
        reason,
    }
}

fn option_selected(r: &BoundRef, tree: &ChoiceTree) -> Result<bool> {
    let (Some(input), Some(id)) = (r.path.parent(), r.path.last()) else {
        return Err(evaluation_error(r, "option path has no parent input".into()));
    };
    match tree.value(&input) {
        None => Ok(false),
        Some(ContextValue::Select(ids)) => Ok(ids.iter().any(|s| s == id)),
        Some(other) => Err(evaluation_error(
            r,
            format!("parent input holds a {} value", other.kind_name()),
        )),
    }
}

fn exists(r: &BoundRef, tree: &ChoiceTree) -> Result<bool> {
    if r.kind == PathKind::Option {
        return option_selected(r, tree);
    }
    Ok(tree.value(&r.path).is_some_and(ContextValue::is_truthy))
}

fn equals(r: &BoundRef, literal: &Literal, tree: &ChoiceTree) -> Result<bool> {
    if let (PathKind::Option, Literal::Bool(b)) = (&r.kind, literal) {
        return option_selected(r, tree).map(|selected| selected == *b);
    }
    match (tree.value(&r.path), literal) {
        (None, _) => Ok(false),
        (Some(ContextValue::Boolean(v)), Literal::Bool(b)) => Ok(v == b),
        (Some(ContextValue::Text(v)), Literal::Text(s)) => Ok(v == s),
        (Some(ContextValue::Select(ids)), Literal::Text(s)) => Ok(ids.len() == 1 && ids[0] == *s),
        (Some(value), literal) => Err(evaluation_error(
            r,
            format!("cannot compare a {} value with {literal:?}", value.kind_name()),
        )),
    }
}

fn contains(r: &BoundRef, literal: &Literal, tree: &ChoiceTree) -> Result<bool> {
    let Literal::Text(id) = literal else {
        return Err(evaluation_error(r, "'contains' needs a string literal".into()));
    };
    match tree.value(&r.path) {
        None => Ok(false),
        Some(ContextValue::Select(ids)) => Ok(ids.iter().any(|s| s == id)),
        Some(other) => Err(evaluation_error(
            r,
            format!("'contains' applied to a {} value", other.kind_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::choices::SetOptions;
    use crate::expr::DeclaredPaths;
    use crate::path::{ContextPath, PathResolver};
    use rstest::rstest;

    struct Declared(HashMap<String, PathKind>);

    impl DeclaredPaths for Declared {
        fn kind_of(&self, path: &ContextPath) -> Option<PathKind> {
            self.0.get(&path.to_string()).cloned()
        }
    }

    fn declared() -> Declared {
        let mut map = HashMap::new();
        map.insert("security".to_string(), PathKind::Boolean);
        map.insert("media-support".to_string(), PathKind::Boolean);
        map.insert("health".to_string(), PathKind::Boolean);
        map.insert("name".to_string(), PathKind::Text);
        map.insert(
            "tracing".to_string(),
            PathKind::Select {
                multiple: false,
                options: vec!["zipkin".into(), "jaeger".into()],
            },
        );
        map.insert("tracing.zipkin".to_string(), PathKind::Option);
        map.insert(
            "features".to_string(),
            PathKind::Select {
                multiple: true,
                options: vec!["health".into(), "metrics".into()],
            },
        );
        Declared(map)
    }

    fn set(tree: &mut ChoiceTree, path: &str, value: ContextValue) {
        tree.set(ContextPath::parse(path).unwrap(), value, SetOptions::default())
            .unwrap();
    }

    fn eval(source: &str, tree: &ChoiceTree) -> bool {
        Condition::compile(
            source,
            &ContextPath::root(),
            &PathResolver::default(),
            &declared(),
        )
        .unwrap()
        .eval(tree)
        .unwrap()
    }

    fn sample_tree() -> ChoiceTree {
        let mut tree = ChoiceTree::new();
        set(&mut tree, "security", ContextValue::Boolean(true));
        set(&mut tree, "name", ContextValue::Text("demo".into()));
        set(&mut tree, "tracing", ContextValue::select(["zipkin"]));
        set(&mut tree, "features", ContextValue::select(["metrics"]));
        tree
    }

    #[test]
    fn negated_and_short_circuits_regardless_of_health() {
        let tree = sample_tree();
        let source = "!(${security} && ${media-support}) || ${health}";
        assert!(eval(source, &tree));

        let mut with_health = sample_tree();
        set(&mut with_health, "health", ContextValue::Boolean(false));
        assert!(eval(source, &with_health));
    }

    #[rstest]
    #[case("${security}", true)]
    #[case("${media-support}", false)]
    #[case("${name} == 'demo'", true)]
    #[case("${name} != 'demo'", false)]
    #[case("${tracing} == 'zipkin'", true)]
    #[case("${tracing} == 'jaeger'", false)]
    #[case("${tracing.zipkin}", true)]
    #[case("${tracing.zipkin} == false", false)]
    #[case("${features} contains 'metrics'", true)]
    #[case("${features} contains 'health'", false)]
    #[case("${security} == true && ${features} contains 'metrics'", true)]
    #[case("${media-support} == false", false)]
    #[case("${media-support} != true", true)]
    fn evaluates(#[case] source: &str, #[case] expected: bool) {
        assert_eq!(eval(source, &sample_tree()), expected);
    }

    #[test]
    fn explicit_false_is_not_truthy() {
        let mut tree = ChoiceTree::new();
        set(&mut tree, "security", ContextValue::Boolean(false));
        assert!(!eval("${security}", &tree));
        assert!(eval("${security} == false", &tree));
    }

    #[test]
    fn kind_mismatch_in_tree_is_fatal() {
        let mut tree = ChoiceTree::new();
        set(&mut tree, "security", ContextValue::Text("yes".into()));
        let condition = Condition::compile(
            "${security} == true",
            &ContextPath::root(),
            &PathResolver::default(),
            &declared(),
        )
        .unwrap();
        assert!(matches!(
            condition.eval(&tree),
            Err(ArchetypeError::ExpressionEvaluation { .. })
        ));
    }
}
