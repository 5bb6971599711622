//! Builtin type universe and its native method implementations.
//!
//! Character indices (`length`, `indexOf`, `substring`) count Unicode
//! scalar values.

use std::sync::Arc;

use evalex_core::{
    MethodDef, MethodTraits, PrimitiveKind, RuntimeError, TypeDef, TypeDescriptor, Value, ValueMap,
    names, native,
};

use crate::TypeRegistry;

/// Register every builtin type, supertypes before subtypes.
pub(crate) fn install(registry: &mut TypeRegistry) {
    registry.insert(object());
    registry.insert(char_sequence());
    registry.insert(comparable());
    registry.insert(string());
    registry.insert(number());
    registry.insert(boolean());
    for kind in PrimitiveKind::ALL.into_iter().filter(|k| k.is_numeric()) {
        registry.insert(boxed_numeric(kind));
    }
    registry.insert(collection());
    registry.insert(list());
    registry.insert(map());
    registry.insert(math());
}

// ============================================================================
// Helpers
// ============================================================================

type NativeResult = Result<Value, RuntimeError>;

fn method<F>(
    owner: &TypeDescriptor,
    name: &str,
    params: Vec<TypeDescriptor>,
    return_type: TypeDescriptor,
    f: F,
) -> Arc<MethodDef>
where
    F: Fn(&Value, &[Value]) -> NativeResult + Send + Sync + 'static,
{
    Arc::new(MethodDef::new(owner.clone(), name, params, return_type, native(f)))
}

fn static_method<F>(
    owner: &TypeDescriptor,
    name: &str,
    params: Vec<TypeDescriptor>,
    return_type: TypeDescriptor,
    f: F,
) -> Arc<MethodDef>
where
    F: Fn(&Value, &[Value]) -> NativeResult + Send + Sync + 'static,
{
    let def = MethodDef::new(owner.clone(), name, params, return_type, native(f));
    Arc::new(def.with_traits(MethodTraits::STATIC))
}

fn arg(args: &[Value], index: usize) -> Result<&Value, RuntimeError> {
    args.get(index)
        .ok_or_else(|| RuntimeError::invalid_bytecode(format!("native call missing argument {index}")))
}

fn cast_error(expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::InvalidCast {
        expected: expected.to_string(),
        found: found.type_name(),
    }
}

fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, RuntimeError> {
    match value {
        Value::Null => Err(RuntimeError::null_value(what)),
        other => other.as_str().ok_or_else(|| cast_error(names::STRING, other)),
    }
}

fn expect_i32(value: &Value) -> Result<i32, RuntimeError> {
    match value {
        Value::Null => Err(RuntimeError::null_value("int argument")),
        other => other.as_i32().ok_or_else(|| cast_error("int", other)),
    }
}

fn expect_f64(value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Int(v) => Ok(*v as f64),
        Value::Long(v) => Ok(*v as f64),
        Value::Float(v) => Ok(*v as f64),
        Value::Double(v) => Ok(*v),
        Value::Null => Err(RuntimeError::null_value("number")),
        other => Err(cast_error(names::NUMBER, other)),
    }
}

fn expect_i64(value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(v) => Ok(*v as i64),
        Value::Long(v) => Ok(*v),
        Value::Float(v) => Ok(*v as i64),
        Value::Double(v) => Ok(*v as i64),
        Value::Null => Err(RuntimeError::null_value("number")),
        other => Err(cast_error(names::NUMBER, other)),
    }
}

fn char_index(text: &str, index: i32) -> Result<usize, RuntimeError> {
    let len = text.chars().count();
    match usize::try_from(index) {
        Ok(i) if i <= len => Ok(text.char_indices().nth(i).map_or(text.len(), |(b, _)| b)),
        _ => Err(RuntimeError::IndexOutOfBounds {
            index: index as i64,
            len,
        }),
    }
}

fn compare_natural(this: &Value, args: &[Value]) -> NativeResult {
    let other = arg(args, 0)?;
    if other.is_null() {
        return Err(RuntimeError::null_value("compareTo argument"));
    }
    this.natural_cmp(other)
        .map(|ordering| Value::Int(ordering as i32))
        .ok_or_else(|| RuntimeError::NativeCall {
            method: "compareTo".to_string(),
            message: format!(
                "{} is not comparable to {}",
                this.type_name(),
                other.type_name()
            ),
        })
}

fn sequence(this: &Value) -> Result<&[Value], RuntimeError> {
    this.as_slice().ok_or_else(|| cast_error(names::COLLECTION, this))
}

fn entries(this: &Value) -> Result<&ValueMap, RuntimeError> {
    this.as_map().ok_or_else(|| cast_error(names::MAP, this))
}

// ============================================================================
// Object, CharSequence, Comparable, String
// ============================================================================

fn object() -> TypeDef {
    let owner = TypeDescriptor::object();
    let mut def = TypeDef::class(names::OBJECT);
    def.methods = vec![
        method(&owner, "toString", vec![], TypeDescriptor::string(), |this, _| {
            Ok(Value::string(this.to_string()))
        }),
        method(
            &owner,
            "equals",
            vec![TypeDescriptor::object()],
            TypeDescriptor::boolean(),
            |this, args| Ok(Value::Bool(this.structural_eq(arg(args, 0)?))),
        ),
    ];
    def
}

fn char_sequence() -> TypeDef {
    let owner = TypeDescriptor::declared(names::CHAR_SEQUENCE);
    let mut def = TypeDef::interface(names::CHAR_SEQUENCE);
    def.methods = vec![
        method(&owner, "length", vec![], TypeDescriptor::int32(), |this, _| {
            Ok(Value::Int(expect_str(this, "receiver")?.chars().count() as i32))
        }),
        method(&owner, "isEmpty", vec![], TypeDescriptor::boolean(), |this, _| {
            Ok(Value::Bool(expect_str(this, "receiver")?.is_empty()))
        }),
    ];
    def
}

fn comparable() -> TypeDef {
    let mut def = TypeDef::interface(names::COMPARABLE).with_type_params(&["T"]);
    def.methods = vec![method(
        &def.self_type(),
        "compareTo",
        vec![TypeDescriptor::Variable(0)],
        TypeDescriptor::int32(),
        compare_natural,
    )];
    def
}

fn string() -> TypeDef {
    let owner = TypeDescriptor::string();
    let string = TypeDescriptor::string;
    let char_seq = || TypeDescriptor::declared(names::CHAR_SEQUENCE);
    let mut def = TypeDef::class(names::STRING)
        .extends(char_seq())
        .extends(TypeDescriptor::comparable_of(string()));
    def.methods = vec![
        method(&owner, "toUpperCase", vec![], string(), |this, _| {
            Ok(Value::string(expect_str(this, "receiver")?.to_uppercase()))
        }),
        method(&owner, "toLowerCase", vec![], string(), |this, _| {
            Ok(Value::string(expect_str(this, "receiver")?.to_lowercase()))
        }),
        method(&owner, "trim", vec![], string(), |this, _| {
            Ok(Value::string(expect_str(this, "receiver")?.trim()))
        }),
        method(
            &owner,
            "contains",
            vec![char_seq()],
            TypeDescriptor::boolean(),
            |this, args| {
                let needle = expect_str(arg(args, 0)?, "contains argument")?;
                Ok(Value::Bool(expect_str(this, "receiver")?.contains(needle)))
            },
        ),
        method(
            &owner,
            "startsWith",
            vec![string()],
            TypeDescriptor::boolean(),
            |this, args| {
                let prefix = expect_str(arg(args, 0)?, "startsWith argument")?;
                Ok(Value::Bool(expect_str(this, "receiver")?.starts_with(prefix)))
            },
        ),
        method(
            &owner,
            "endsWith",
            vec![string()],
            TypeDescriptor::boolean(),
            |this, args| {
                let suffix = expect_str(arg(args, 0)?, "endsWith argument")?;
                Ok(Value::Bool(expect_str(this, "receiver")?.ends_with(suffix)))
            },
        ),
        method(
            &owner,
            "equalsIgnoreCase",
            vec![string()],
            TypeDescriptor::boolean(),
            |this, args| {
                let text = expect_str(this, "receiver")?;
                Ok(Value::Bool(match arg(args, 0)? {
                    Value::String(other) => text.to_lowercase() == other.to_lowercase(),
                    _ => false,
                }))
            },
        ),
        method(
            &owner,
            "indexOf",
            vec![string()],
            TypeDescriptor::int32(),
            |this, args| {
                let text = expect_str(this, "receiver")?;
                let needle = expect_str(arg(args, 0)?, "indexOf argument")?;
                Ok(Value::Int(
                    text.find(needle)
                        .map_or(-1, |b| text[..b].chars().count() as i32),
                ))
            },
        ),
        method(
            &owner,
            "substring",
            vec![TypeDescriptor::int32()],
            string(),
            |this, args| {
                let text = expect_str(this, "receiver")?;
                let begin = char_index(text, expect_i32(arg(args, 0)?)?)?;
                Ok(Value::string(&text[begin..]))
            },
        ),
        method(
            &owner,
            "substring",
            vec![TypeDescriptor::int32(), TypeDescriptor::int32()],
            string(),
            |this, args| {
                let text = expect_str(this, "receiver")?;
                let begin = char_index(text, expect_i32(arg(args, 0)?)?)?;
                let end = char_index(text, expect_i32(arg(args, 1)?)?)?;
                if end < begin {
                    return Err(RuntimeError::IndexOutOfBounds {
                        index: end as i64,
                        len: text.chars().count(),
                    });
                }
                Ok(Value::string(&text[begin..end]))
            },
        ),
        method(&owner, "concat", vec![string()], string(), |this, args| {
            let tail = expect_str(arg(args, 0)?, "concat argument")?;
            Ok(Value::string(format!("{}{tail}", expect_str(this, "receiver")?)))
        }),
        method(
            &owner,
            "replace",
            vec![char_seq(), char_seq()],
            string(),
            |this, args| {
                let from = expect_str(arg(args, 0)?, "replace target")?;
                let to = expect_str(arg(args, 1)?, "replace replacement")?;
                Ok(Value::string(expect_str(this, "receiver")?.replace(from, to)))
            },
        ),
        method(
            &owner,
            "split",
            vec![string()],
            TypeDescriptor::array_of(string()),
            |this, args| {
                let separator = expect_str(arg(args, 0)?, "split separator")?;
                let text = expect_str(this, "receiver")?;
                Ok(Value::array(text.split(separator).map(Value::from)))
            },
        ),
        method(
            &owner,
            "compareTo",
            vec![string()],
            TypeDescriptor::int32(),
            compare_natural,
        ),
        static_method(
            &owner,
            "valueOf",
            vec![TypeDescriptor::object()],
            string(),
            |_, args| Ok(Value::string(arg(args, 0)?.to_string())),
        ),
        Arc::new(
            MethodDef::new(
                owner.clone(),
                "join",
                vec![char_seq(), TypeDescriptor::array_of(char_seq())],
                string(),
                native(|_, args| {
                    let delimiter = expect_str(arg(args, 0)?, "join delimiter")?;
                    let parts = arg(args, 1)?
                        .as_slice()
                        .ok_or_else(|| RuntimeError::null_value("join elements"))?;
                    let parts: Vec<String> = parts.iter().map(Value::to_string).collect();
                    Ok(Value::string(parts.join(delimiter)))
                }),
            )
            .with_traits(MethodTraits::STATIC | MethodTraits::VARARGS),
        ),
    ];
    def
}

// ============================================================================
// Number and the boxed primitives
// ============================================================================

fn number() -> TypeDef {
    let owner = TypeDescriptor::declared(names::NUMBER);
    let mut def = TypeDef::class(names::NUMBER);
    def.methods = vec![
        method(&owner, "intValue", vec![], TypeDescriptor::int32(), |this, _| {
            Ok(Value::Int(expect_i64(this)? as i32))
        }),
        method(&owner, "longValue", vec![], TypeDescriptor::int64(), |this, _| {
            Ok(Value::Long(expect_i64(this)?))
        }),
        method(&owner, "floatValue", vec![], TypeDescriptor::float32(), |this, _| {
            Ok(Value::Float(expect_f64(this)? as f32))
        }),
        method(&owner, "doubleValue", vec![], TypeDescriptor::float64(), |this, _| {
            Ok(Value::Double(expect_f64(this)?))
        }),
    ];
    def
}

fn boolean() -> TypeDef {
    let owner = TypeDescriptor::Boxed(PrimitiveKind::Bool);
    let mut def = TypeDef::class(PrimitiveKind::Bool.box_name())
        .extends(TypeDescriptor::comparable_of(owner.clone()));
    def.methods = vec![
        method(&owner, "booleanValue", vec![], TypeDescriptor::boolean(), |this, _| {
            this.as_bool()
                .map(Value::Bool)
                .ok_or_else(|| cast_error("boolean", this))
        }),
        method(
            &owner,
            "compareTo",
            vec![owner.clone()],
            TypeDescriptor::int32(),
            compare_natural,
        ),
        static_method(
            &owner,
            "parseBoolean",
            vec![TypeDescriptor::string()],
            TypeDescriptor::boolean(),
            |_, args| {
                Ok(Value::Bool(match arg(args, 0)? {
                    Value::String(s) => s.eq_ignore_ascii_case("true"),
                    _ => false,
                }))
            },
        ),
    ];
    def
}

fn parse_name(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Int32 => "parseInt",
        PrimitiveKind::Int64 => "parseLong",
        PrimitiveKind::Float32 => "parseFloat",
        PrimitiveKind::Float64 => "parseDouble",
        PrimitiveKind::Bool => "parseBoolean",
    }
}

fn parse_primitive(kind: PrimitiveKind, text: &str) -> NativeResult {
    let parsed = match kind {
        PrimitiveKind::Int32 => text.parse().map(Value::Int).map_err(|e| e.to_string()),
        PrimitiveKind::Int64 => text.parse().map(Value::Long).map_err(|e| e.to_string()),
        PrimitiveKind::Float32 => text.trim().parse().map(Value::Float).map_err(|e| e.to_string()),
        PrimitiveKind::Float64 => text.trim().parse().map(Value::Double).map_err(|e| e.to_string()),
        PrimitiveKind::Bool => Ok(Value::Bool(text.eq_ignore_ascii_case("true"))),
    };
    parsed.map_err(|message| RuntimeError::NativeCall {
        method: format!("{}.{}", kind.box_name(), parse_name(kind)),
        message: format!("{message}: \"{text}\""),
    })
}

fn boxed_numeric(kind: PrimitiveKind) -> TypeDef {
    let owner = TypeDescriptor::Boxed(kind);
    let primitive = TypeDescriptor::Primitive(kind);
    let mut def = TypeDef::class(kind.box_name())
        .extends(TypeDescriptor::declared(names::NUMBER))
        .extends(TypeDescriptor::comparable_of(owner.clone()));
    def.methods = vec![
        method(
            &owner,
            "compareTo",
            vec![owner.clone()],
            TypeDescriptor::int32(),
            compare_natural,
        ),
        static_method(&owner, "valueOf", vec![primitive.clone()], owner.clone(), |_, args| {
            arg(args, 0).cloned()
        }),
        static_method(
            &owner,
            parse_name(kind),
            vec![TypeDescriptor::string()],
            primitive,
            move |_, args| parse_primitive(kind, expect_str(arg(args, 0)?, "number text")?),
        ),
    ];
    if !kind.is_integral() {
        def.methods.push(method(
            &owner,
            "isNaN",
            vec![],
            TypeDescriptor::boolean(),
            |this, _| Ok(Value::Bool(expect_f64(this)?.is_nan())),
        ));
    }
    def
}

// ============================================================================
// Collections
// ============================================================================

fn collection() -> TypeDef {
    let mut def = TypeDef::interface(names::COLLECTION).with_type_params(&["E"]);
    let owner = def.self_type();
    def.methods = vec![
        method(&owner, "size", vec![], TypeDescriptor::int32(), |this, _| {
            Ok(Value::Int(sequence(this)?.len() as i32))
        }),
        method(&owner, "isEmpty", vec![], TypeDescriptor::boolean(), |this, _| {
            Ok(Value::Bool(sequence(this)?.is_empty()))
        }),
        method(
            &owner,
            "contains",
            vec![TypeDescriptor::object()],
            TypeDescriptor::boolean(),
            |this, args| {
                let needle = arg(args, 0)?;
                Ok(Value::Bool(
                    sequence(this)?.iter().any(|v| v.structural_eq(needle)),
                ))
            },
        ),
    ];
    def
}

fn list() -> TypeDef {
    let mut def = TypeDef::interface(names::LIST)
        .with_type_params(&["E"])
        .extends(TypeDescriptor::generic(
            names::COLLECTION,
            vec![TypeDescriptor::Variable(0)],
        ));
    let owner = def.self_type();
    def.methods = vec![
        method(
            &owner,
            "get",
            vec![TypeDescriptor::int32()],
            TypeDescriptor::Variable(0),
            |this, args| {
                let items = sequence(this)?;
                let index = expect_i32(arg(args, 0)?)?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or(RuntimeError::IndexOutOfBounds {
                        index: index as i64,
                        len: items.len(),
                    })
            },
        ),
        method(
            &owner,
            "indexOf",
            vec![TypeDescriptor::object()],
            TypeDescriptor::int32(),
            |this, args| {
                let needle = arg(args, 0)?;
                Ok(Value::Int(
                    sequence(this)?
                        .iter()
                        .position(|v| v.structural_eq(needle))
                        .map_or(-1, |i| i as i32),
                ))
            },
        ),
    ];
    def
}

fn map() -> TypeDef {
    let mut def = TypeDef::interface(names::MAP).with_type_params(&["K", "V"]);
    let owner = def.self_type();
    def.methods = vec![
        method(&owner, "size", vec![], TypeDescriptor::int32(), |this, _| {
            Ok(Value::Int(entries(this)?.len() as i32))
        }),
        method(&owner, "isEmpty", vec![], TypeDescriptor::boolean(), |this, _| {
            Ok(Value::Bool(entries(this)?.is_empty()))
        }),
        method(
            &owner,
            "get",
            vec![TypeDescriptor::object()],
            TypeDescriptor::Variable(1),
            |this, args| {
                let map = entries(this)?;
                Ok(arg(args, 0)?
                    .as_str()
                    .and_then(|key| map.get(key))
                    .cloned()
                    .unwrap_or_default())
            },
        ),
        method(
            &owner,
            "getOrDefault",
            vec![TypeDescriptor::object(), TypeDescriptor::Variable(1)],
            TypeDescriptor::Variable(1),
            |this, args| {
                let map = entries(this)?;
                let fallback = arg(args, 1)?;
                Ok(arg(args, 0)?
                    .as_str()
                    .and_then(|key| map.get(key))
                    .unwrap_or(fallback)
                    .clone())
            },
        ),
        method(
            &owner,
            "containsKey",
            vec![TypeDescriptor::object()],
            TypeDescriptor::boolean(),
            |this, args| {
                let map = entries(this)?;
                Ok(Value::Bool(
                    arg(args, 0)?.as_str().is_some_and(|key| map.contains_key(key)),
                ))
            },
        ),
    ];
    def
}

// ============================================================================
// Math
// ============================================================================

fn math() -> TypeDef {
    let owner = TypeDescriptor::declared("Math");
    let double = TypeDescriptor::float64;
    let mut def = TypeDef::class("Math");
    def.methods = vec![
        static_method(&owner, "sqrt", vec![double()], double(), |_, args| {
            Ok(Value::Double(expect_f64(arg(args, 0)?)?.sqrt()))
        }),
        static_method(&owner, "pow", vec![double(), double()], double(), |_, args| {
            let base = expect_f64(arg(args, 0)?)?;
            Ok(Value::Double(base.powf(expect_f64(arg(args, 1)?)?)))
        }),
        static_method(&owner, "floor", vec![double()], double(), |_, args| {
            Ok(Value::Double(expect_f64(arg(args, 0)?)?.floor()))
        }),
        static_method(&owner, "ceil", vec![double()], double(), |_, args| {
            Ok(Value::Double(expect_f64(arg(args, 0)?)?.ceil()))
        }),
        static_method(
            &owner,
            "round",
            vec![double()],
            TypeDescriptor::int64(),
            |_, args| Ok(Value::Long((expect_f64(arg(args, 0)?)? + 0.5).floor() as i64)),
        ),
    ];
    def
}
