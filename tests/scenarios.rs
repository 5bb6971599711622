//! End-to-end compile-then-evaluate scenarios.

use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

use evalex::ast::{ArithmeticOp, ExpressionNode, RelationalOp};
use evalex::{CompilationContext, DeclaredContext, Error, Expression, SimpleContext};
use evalex_core::{
    CompilationError, HostObject, MethodDef, MethodTraits, PrimitiveKind, PropertyDef, RuntimeError,
    TypeCatalog, TypeDef, TypeDescriptor, Value, names, native,
};
use evalex_registry::TypeRegistry;

// ============================================================================
// Host types
// ============================================================================

#[derive(Debug)]
struct User {
    name: String,
    age: i32,
}

impl HostObject for User {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::declared("User")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A `major.minor` version, ordered against its string form.
#[derive(Debug)]
struct Version(u32, u32);

impl Version {
    fn parse(text: &str) -> Option<(u32, u32)> {
        let (major, minor) = text.split_once('.')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }
}

impl HostObject for Version {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::declared("Version")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn user_type() -> TypeDescriptor {
    TypeDescriptor::declared("User")
}

fn version_type() -> TypeDescriptor {
    TypeDescriptor::declared("Version")
}

fn host_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_builtins();

    let mut user = TypeDef::class("User");
    user.methods = vec![
        Arc::new(MethodDef::new(
            user_type(),
            "getAge",
            vec![],
            TypeDescriptor::int32(),
            native(|this, _| {
                let user = this
                    .downcast_ref::<User>()
                    .ok_or_else(|| RuntimeError::null_value("user"))?;
                Ok(Value::Int(user.age))
            }),
        )),
        Arc::new(MethodDef::new(
            user_type(),
            "getName",
            vec![],
            TypeDescriptor::string(),
            native(|this, _| {
                let user = this
                    .downcast_ref::<User>()
                    .ok_or_else(|| RuntimeError::null_value("user"))?;
                Ok(Value::from(user.name.as_str()))
            }),
        )),
    ];
    registry.register_type(user).unwrap();

    let mut version = TypeDef::class("Version")
        .extends(TypeDescriptor::comparable_of(TypeDescriptor::string()));
    version.methods = vec![Arc::new(MethodDef::new(
        version_type(),
        "compareTo",
        vec![TypeDescriptor::string()],
        TypeDescriptor::int32(),
        native(|this, args| {
            let Version(major, minor) = this
                .downcast_ref::<Version>()
                .ok_or_else(|| RuntimeError::null_value("version"))?;
            let other = args
                .first()
                .and_then(Value::as_str)
                .and_then(Version::parse)
                .ok_or_else(|| RuntimeError::NativeCall {
                    method: "compareTo".into(),
                    message: "malformed version".into(),
                })?;
            let ordering = (*major, *minor).cmp(&other);
            Ok(Value::Int(match ordering {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }),
    ))];
    registry.register_type(version).unwrap();

    let overloaded = TypeDescriptor::declared("Overloaded");
    let mut def = TypeDef::class("Overloaded");
    let pick = |params: Vec<TypeDescriptor>, tag: &'static str| {
        Arc::new(
            MethodDef::new(
                overloaded.clone(),
                "pick",
                params,
                TypeDescriptor::string(),
                native(move |_, _| Ok(Value::from(tag))),
            )
            .with_traits(MethodTraits::STATIC),
        )
    };
    def.methods = vec![
        pick(vec![TypeDescriptor::object(), TypeDescriptor::string()], "os"),
        pick(vec![TypeDescriptor::string(), TypeDescriptor::object()], "so"),
        pick(vec![TypeDescriptor::int32()], "int"),
    ];
    registry.register_type(def).unwrap();

    let mut counter = TypeDef::class("Counter");
    counter.methods = vec![Arc::new(
        MethodDef::new(
            TypeDescriptor::declared("Counter"),
            "count",
            vec![TypeDescriptor::array_of(TypeDescriptor::object())],
            TypeDescriptor::int32(),
            native(|_, args| {
                let items = args.first().and_then(Value::as_slice).unwrap_or_default();
                Ok(Value::Int(items.len() as i32))
            }),
        )
        .with_traits(MethodTraits::STATIC | MethodTraits::VARARGS),
    )];
    registry.register_type(counter).unwrap();

    registry
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    registry: Arc<TypeRegistry>,
    facade: DeclaredContext,
}

impl Harness {
    fn new(facade: DeclaredContext) -> Self {
        Self {
            registry: Arc::new(host_registry()),
            facade,
        }
    }

    fn compile(&self, node: &ExpressionNode) -> evalex::Result<Expression> {
        let ctx = CompilationContext::new(self.registry.clone(), &self.facade);
        Expression::compile(node, &ctx)
    }

    #[track_caller]
    fn eval(&self, node: &ExpressionNode, context: &SimpleContext) -> Value {
        self.compile(node)
            .unwrap()
            .evaluate(context)
            .unwrap()
    }
}

fn element(name: &str) -> ExpressionNode {
    ExpressionNode::element(name)
}

fn add(left: ExpressionNode, right: ExpressionNode) -> ExpressionNode {
    ExpressionNode::arithmetic(ArithmeticOp::Add, left, right)
}

fn empty() -> SimpleContext {
    SimpleContext::new()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn sum_of_two_arguments() {
    let harness = Harness::new(
        DeclaredContext::new()
            .parameter("a", TypeDescriptor::int32())
            .parameter("b", TypeDescriptor::int32()),
    );
    let context = SimpleContext::new().with_argument(3).with_argument(4);
    assert_eq!(harness.eval(&add(element("a"), element("b")), &context), Value::Int(7));
}

#[test]
fn string_concatenation() {
    let harness = Harness::new(DeclaredContext::new().parameter("name", TypeDescriptor::string()));
    let context = SimpleContext::new().with_argument("Tim");
    let node = add(element("name"), ExpressionNode::string("!"));
    assert_eq!(harness.eval(&node, &context), Value::from("Tim!"));

    let chained = add(add(ExpressionNode::string("v"), ExpressionNode::double(2.0)), ExpressionNode::null());
    assert_eq!(harness.eval(&chained, &empty()), Value::from("v2.0null"));
}

#[test]
fn numeric_promotion() {
    let harness = Harness::new(DeclaredContext::new());
    let mixed = add(ExpressionNode::int(1), ExpressionNode::double(2.0));
    let expression = harness.compile(&mixed).unwrap();
    assert_eq!(expression.result_type(), &TypeDescriptor::float64());
    assert_eq!(expression.evaluate(&empty()).unwrap(), Value::Double(3.0));

    let long = add(ExpressionNode::int(1), ExpressionNode::long(2));
    assert_eq!(harness.eval(&long, &empty()), Value::Long(3));

    let text = add(ExpressionNode::string("a"), ExpressionNode::int(1));
    assert_eq!(harness.eval(&text, &empty()), Value::from("a1"));

    let power = ExpressionNode::arithmetic(ArithmeticOp::Pow, ExpressionNode::int(2), ExpressionNode::int(10));
    assert_eq!(harness.eval(&power, &empty()), Value::Long(1024));
}

#[test]
fn list_map_and_array_subscripts() {
    let harness = Harness::new(
        DeclaredContext::new()
            .parameter("items", TypeDescriptor::list_of(TypeDescriptor::string()))
            .parameter(
                "scores",
                TypeDescriptor::map_of(
                    TypeDescriptor::string(),
                    TypeDescriptor::Boxed(evalex_core::PrimitiveKind::Int32),
                ),
            )
            .parameter(
                "matrix",
                TypeDescriptor::array_of(TypeDescriptor::array_of(TypeDescriptor::int32())),
            ),
    );
    let context = SimpleContext::new()
        .with_argument(Value::list(["x", "y", "z"].map(Value::from)))
        .with_argument(Value::map([("k", Value::Int(9))]))
        .with_argument(Value::array([
            Value::array([Value::Int(1), Value::Int(2)]),
            Value::array([Value::Int(3), Value::Int(4)]),
        ]));

    let item = ExpressionNode::subscript(element("items"), ExpressionNode::int(1));
    assert_eq!(harness.eval(&item, &context), Value::from("y"));

    let score = ExpressionNode::subscript(element("scores"), ExpressionNode::string("k"));
    assert_eq!(harness.eval(&score, &context), Value::Int(9));
    let missing = ExpressionNode::subscript(element("scores"), ExpressionNode::string("nope"));
    assert_eq!(harness.eval(&missing, &context), Value::Null);

    let row = ExpressionNode::subscript(element("matrix"), ExpressionNode::int(1));
    let expression = harness.compile(&row).unwrap();
    assert_eq!(
        expression.result_type(),
        &TypeDescriptor::array_of(TypeDescriptor::int32())
    );
    let cell = ExpressionNode::subscript(row, ExpressionNode::int(0));
    assert_eq!(harness.eval(&cell, &context), Value::Int(3));

    let length = ExpressionNode::property(element("matrix"), "length");
    assert_eq!(harness.eval(&length, &context), Value::Int(2));
}

#[test]
fn property_comparison_on_host_object() {
    let harness = Harness::new(DeclaredContext::new().parameter("user", user_type()));
    let node = ExpressionNode::relational(
        RelationalOp::Ge,
        ExpressionNode::property(element("user"), "age"),
        ExpressionNode::int(18),
    );
    let adult = SimpleContext::new().with_argument(Value::object(User {
        name: "Tim".into(),
        age: 30,
    }));
    let minor = SimpleContext::new().with_argument(Value::object(User {
        name: "Kit".into(),
        age: 12,
    }));
    let expression = harness.compile(&node).unwrap();
    assert!(expression.result_type().is_boolean());
    assert_eq!(expression.evaluate(&adult).unwrap(), Value::Bool(true));
    assert_eq!(expression.evaluate(&minor).unwrap(), Value::Bool(false));

    let wrong_type = SimpleContext::new().with_argument("Tim");
    assert!(matches!(
        expression.evaluate(&wrong_type),
        Err(RuntimeError::InvalidCast { .. })
    ));
}

#[test]
fn comparable_orientation_is_symmetric() {
    let harness = Harness::new(DeclaredContext::new().parameter("version", version_type()));
    for (major, minor) in [(1, 0), (2, 0), (2, 5), (3, 1)] {
        let context = SimpleContext::new().with_argument(Value::object(Version(major, minor)));
        for (op, flipped) in [
            (RelationalOp::Lt, RelationalOp::Gt),
            (RelationalOp::Le, RelationalOp::Ge),
            (RelationalOp::Gt, RelationalOp::Lt),
            (RelationalOp::Ge, RelationalOp::Le),
        ] {
            let receiver_left =
                ExpressionNode::relational(op, element("version"), ExpressionNode::string("2.0"));
            let receiver_right =
                ExpressionNode::relational(flipped, ExpressionNode::string("2.0"), element("version"));
            let expected = match op {
                RelationalOp::Lt => (major, minor) < (2, 0),
                RelationalOp::Le => (major, minor) <= (2, 0),
                RelationalOp::Gt => (major, minor) > (2, 0),
                RelationalOp::Ge => (major, minor) >= (2, 0),
            };
            assert_eq!(harness.eval(&receiver_left, &context), Value::Bool(expected));
            assert_eq!(harness.eval(&receiver_right, &context), Value::Bool(expected));
        }
    }
}

#[test]
fn strings_order_naturally() {
    let harness = Harness::new(DeclaredContext::new());
    let node = ExpressionNode::relational(
        RelationalOp::Lt,
        ExpressionNode::string("apple"),
        ExpressionNode::string("banana"),
    );
    assert_eq!(harness.eval(&node, &empty()), Value::Bool(true));
}

#[test]
fn equality_compares_boxed_values() {
    let harness = Harness::new(DeclaredContext::new().parameter("boxed", TypeDescriptor::Boxed(PrimitiveKind::Int32)));
    let mixed = ExpressionNode::equals(ExpressionNode::int(1), ExpressionNode::long(1));
    assert_eq!(harness.eval(&mixed, &empty()), Value::Bool(false));

    let widened = ExpressionNode::not_equals(ExpressionNode::int(2), ExpressionNode::double(2.0));
    assert_eq!(harness.eval(&widened, &empty()), Value::Bool(true));

    let same_kind = ExpressionNode::equals(element("boxed"), ExpressionNode::int(7));
    assert_eq!(harness.eval(&same_kind, &SimpleContext::new().with_argument(7)), Value::Bool(true));

    let with_null = ExpressionNode::equals(element("boxed"), ExpressionNode::null());
    assert_eq!(harness.eval(&with_null, &SimpleContext::new().with_argument(Value::Null)), Value::Bool(true));
}

#[test]
fn varargs_expand_or_pass_through() {
    let harness = Harness::new(
        DeclaredContext::new().parameter("parts", TypeDescriptor::array_of(TypeDescriptor::string())),
    );
    let expanded = ExpressionNode::static_call(
        names::STRING,
        "join",
        vec![
            ExpressionNode::string(","),
            ExpressionNode::string("a"),
            ExpressionNode::string("b"),
        ],
    );
    assert_eq!(harness.eval(&expanded, &empty()), Value::from("a,b"));

    let none = ExpressionNode::static_call(names::STRING, "join", vec![ExpressionNode::string(",")]);
    assert_eq!(harness.eval(&none, &empty()), Value::from(""));

    let prebuilt = ExpressionNode::static_call(
        names::STRING,
        "join",
        vec![ExpressionNode::string("-"), element("parts")],
    );
    let context = SimpleContext::new().with_argument(Value::array(["x", "y"].map(Value::from)));
    assert_eq!(harness.eval(&prebuilt, &context), Value::from("x-y"));
}

#[test]
fn overlapping_overloads_are_ambiguous() {
    let harness = Harness::new(DeclaredContext::new());
    let node = ExpressionNode::static_call(
        "Overloaded",
        "pick",
        vec![ExpressionNode::string("a"), ExpressionNode::string("b")],
    );
    let err = harness.compile(&node).unwrap_err();
    assert!(matches!(
        err,
        Error::Compilation(CompilationError::AmbiguousMethod { .. })
    ));

    let single = ExpressionNode::static_call(
        "Overloaded",
        "pick",
        vec![ExpressionNode::string("a"), ExpressionNode::int(1)],
    );
    assert_eq!(harness.eval(&single, &empty()), Value::from("so"));
}

#[test]
fn null_safe_navigation_and_elvis() {
    let harness = Harness::new(
        DeclaredContext::new()
            .parameter("user", user_type())
            .parameter("nick", TypeDescriptor::string()),
    );
    let age = ExpressionNode::safe_property(element("user"), "age");
    let absent = SimpleContext::new()
        .with_argument(Value::Null)
        .with_argument(Value::Null);
    assert_eq!(harness.eval(&age, &absent), Value::Null);

    let strict = ExpressionNode::property(element("user"), "age");
    assert!(matches!(
        harness.compile(&strict).unwrap().evaluate(&absent),
        Err(RuntimeError::NullValue { .. })
    ));

    let fallback = ExpressionNode::elvis(element("nick"), ExpressionNode::string("anon"));
    assert_eq!(harness.eval(&fallback, &absent), Value::from("anon"));
    let present = SimpleContext::new()
        .with_argument(Value::Null)
        .with_argument("tim");
    assert_eq!(harness.eval(&fallback, &present), Value::from("tim"));
}

#[test]
fn ternary_and_logic() {
    let harness = Harness::new(DeclaredContext::new().parameter("n", TypeDescriptor::int32()));
    let node = ExpressionNode::ternary(
        ExpressionNode::and(
            ExpressionNode::relational(RelationalOp::Gt, element("n"), ExpressionNode::int(0)),
            ExpressionNode::not(ExpressionNode::equals(element("n"), ExpressionNode::int(3))),
        ),
        ExpressionNode::string("yes"),
        ExpressionNode::string("no"),
    );
    assert_eq!(harness.eval(&node, &SimpleContext::new().with_argument(5)), Value::from("yes"));
    assert_eq!(harness.eval(&node, &SimpleContext::new().with_argument(3)), Value::from("no"));
    assert_eq!(harness.eval(&node, &SimpleContext::new().with_argument(-1)), Value::from("no"));
}

#[test]
fn short_circuit_skips_failing_operand() {
    let harness = Harness::new(DeclaredContext::new());
    let failing = ExpressionNode::equals(
        ExpressionNode::arithmetic(ArithmeticOp::Div, ExpressionNode::int(1), ExpressionNode::int(0)),
        ExpressionNode::int(0),
    );
    let node = ExpressionNode::or(ExpressionNode::boolean(true), failing);
    assert_eq!(harness.eval(&node, &empty()), Value::Bool(true));
}

#[test]
fn type_tests_and_patterns() {
    let harness = Harness::new(
        DeclaredContext::new()
            .parameter("anything", TypeDescriptor::object())
            .parameter("name", TypeDescriptor::string()),
    );
    let is_string = ExpressionNode::instance_of(element("anything"), "CharSequence");
    let matches = ExpressionNode::matches(element("name"), "[A-Z][a-z]+");

    let context = SimpleContext::new().with_argument("x").with_argument("Tim");
    assert_eq!(harness.eval(&is_string, &context), Value::Bool(true));
    assert_eq!(harness.eval(&matches, &context), Value::Bool(true));

    let context = SimpleContext::new().with_argument(4).with_argument("tim");
    assert_eq!(harness.eval(&is_string, &context), Value::Bool(false));
    assert_eq!(harness.eval(&matches, &context), Value::Bool(false));

    let nulls = SimpleContext::new()
        .with_argument(Value::Null)
        .with_argument(Value::Null);
    assert_eq!(harness.eval(&is_string, &nulls), Value::Bool(false));
    assert_eq!(harness.eval(&matches, &nulls), Value::Bool(false));
}

#[test]
fn empty_test() {
    let harness = Harness::new(
        DeclaredContext::new().parameter("items", TypeDescriptor::list_of(TypeDescriptor::string())),
    );
    let node = ExpressionNode::empty(element("items"));
    assert_eq!(
        harness.eval(&node, &SimpleContext::new().with_argument(Value::list(Vec::new()))),
        Value::Bool(true)
    );
    assert_eq!(
        harness.eval(&node, &SimpleContext::new().with_argument(Value::Null)),
        Value::Bool(true)
    );
    assert_eq!(
        harness.eval(&node, &SimpleContext::new().with_argument(Value::list([Value::from("a")]))),
        Value::Bool(false)
    );
}

#[test]
fn context_bound_lookups() {
    let getter = host_registry().methods(&user_type(), "getName").remove(0);
    let name = PropertyDef {
        name: "currentName".into(),
        ty: TypeDescriptor::string(),
        getter,
    };
    let harness = Harness::new(
        DeclaredContext::new()
            .property(user_type(), name)
            .with_this(user_type()),
    );
    let context = SimpleContext::new()
        .with_bean(
            user_type(),
            Value::object(User {
                name: "Bean".into(),
                age: 40,
            }),
        )
        .with_this(Value::object(User {
            name: "Self".into(),
            age: 20,
        }))
        .with_environment("REGION", "eu");

    assert_eq!(harness.eval(&element("currentName"), &context), Value::from("Bean"));
    assert_eq!(
        harness.eval(&ExpressionNode::property(ExpressionNode::this(), "name"), &context),
        Value::from("Self")
    );
    assert_eq!(
        harness.eval(&ExpressionNode::property(ExpressionNode::bean("User"), "age"), &context),
        Value::Int(40)
    );
    assert_eq!(
        harness.eval(&ExpressionNode::environment(ExpressionNode::string("REGION")), &context),
        Value::from("eu")
    );
    assert_eq!(
        harness.eval(&ExpressionNode::environment(ExpressionNode::string("UNSET")), &context),
        Value::Null
    );

    let no_bean = SimpleContext::new();
    let err = harness
        .compile(&ExpressionNode::bean("User"))
        .unwrap()
        .evaluate(&no_bean)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NoSuchBean { .. }));
}

#[test]
fn bare_varargs_context_method() {
    let count = host_registry()
        .methods(&TypeDescriptor::declared("Counter"), "count")
        .remove(0);
    let harness = Harness::new(DeclaredContext::new().method(count));
    assert_eq!(harness.eval(&element("count"), &empty()), Value::Int(0));

    let call = ExpressionNode::call(
        "count",
        vec![ExpressionNode::string("a"), ExpressionNode::int(2)],
    );
    assert_eq!(harness.eval(&call, &empty()), Value::Int(2));
}

#[test]
fn resolution_is_reused_by_compilation() {
    let harness = Harness::new(DeclaredContext::new().parameter("user", user_type()));
    let node = add(
        ExpressionNode::property(element("user"), "name"),
        ExpressionNode::string("?"),
    );
    let ctx = CompilationContext::new(harness.registry.clone(), &harness.facade);
    let first = node.resolve_type(&ctx).unwrap();
    let second = node.resolve_type(&ctx).unwrap();
    assert_eq!(first, second);

    let expression = harness.compile(&node).unwrap();
    let context = SimpleContext::new().with_argument(Value::object(User {
        name: "Ann".into(),
        age: 1,
    }));
    assert_eq!(expression.evaluate(&context).unwrap(), Value::from("Ann?"));
}

#[test]
fn compiled_expression_is_shared_across_threads() {
    let harness = Harness::new(
        DeclaredContext::new()
            .parameter("a", TypeDescriptor::int64())
            .parameter("b", TypeDescriptor::int32()),
    );
    let node = ExpressionNode::arithmetic(ArithmeticOp::Mul, element("a"), element("b"));
    let expression = harness.compile(&node).unwrap();

    std::thread::scope(|scope| {
        for i in 0..4_i64 {
            let expression = &expression;
            scope.spawn(move || {
                let context = SimpleContext::new().with_argument(i).with_argument(3);
                assert_eq!(expression.evaluate(&context).unwrap(), Value::Long(i * 3));
            });
        }
    });
}

#[test]
fn compilation_errors_surface_verbatim() {
    let harness = Harness::new(DeclaredContext::new().parameter("a", TypeDescriptor::int32()));
    let unknown = harness.compile(&element("b")).unwrap_err();
    assert!(matches!(
        unknown.as_compilation_error(),
        Some(CompilationError::UnknownName { name, .. }) if name == "b"
    ));

    let this = harness.compile(&ExpressionNode::this()).unwrap_err();
    assert!(matches!(
        this,
        Error::Compilation(CompilationError::UnresolvedThis { .. })
    ));

    let mismatch = harness
        .compile(&add(ExpressionNode::boolean(true), element("a")))
        .unwrap_err();
    assert!(mismatch.to_string().contains("cannot be applied"));
}
