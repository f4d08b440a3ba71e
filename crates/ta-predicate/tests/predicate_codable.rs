// predicate_codable.rs — End-to-end encode/decode tests under allowlists.
//
// Every scenario encodes a predicate with one configuration, decodes it with
// the same or another configuration, and compares the decoded predicate's
// behavior with the predicate it came from. Rejections are checked for the
// error kind and for the identifiers and paths the error names.
//
// The host model is two records:
//
//   Object  { a: Int, b: String, c: Double, d: Int, e: Character,
//             f: Bool, g: [Int], h: Object2 }   provides f, g, h
//   Object2 { a: Int, b: String }                provides a

use std::collections::BTreeMap;

use ta_predicate::{
    decode, encode, standard, Accessor, CodingError, ComparisonOperator, Configuration,
    Expression, Predicate, PredicateError, PredicateInput, Record, RecordType, TypeConstructor,
    Value, ValueType,
};

static OBJECT: RecordType = RecordType::new("Object", object_accessors);
static OBJECT2: RecordType = RecordType::new("Object2", object2_accessors);

const OBJECT_ID: &str = "tests.Object";

fn object_accessors() -> Vec<(&'static str, Accessor)> {
    vec![
        ("Object.f", object_field("f")),
        ("Object.g", object_field("g")),
        ("Object.h", object_field("h")),
    ]
}

fn object2_accessors() -> Vec<(&'static str, Accessor)> {
    vec![("Object2.a", object2_field("a"))]
}

fn object_field(name: &'static str) -> Accessor {
    let value = match name {
        "a" | "d" => ValueType::Int,
        "b" => ValueType::String,
        "c" => ValueType::Double,
        "e" => ValueType::Character,
        "f" => ValueType::Bool,
        "g" => ValueType::array(ValueType::Int),
        "h" => ValueType::Record(&OBJECT2),
        other => panic!("Object has no field {}", other),
    };
    Accessor::field(&OBJECT, name, value)
}

fn object2_field(name: &'static str) -> Accessor {
    let value = match name {
        "a" => ValueType::Int,
        "b" => ValueType::String,
        other => panic!("Object2 has no field {}", other),
    };
    Accessor::field(&OBJECT2, name, value)
}

#[derive(Debug, Clone, PartialEq)]
struct Object {
    a: i64,
    b: String,
    c: f64,
    d: i64,
    e: char,
    f: bool,
    g: Vec<i64>,
    h: Object2,
}

#[derive(Debug, Clone, PartialEq)]
struct Object2 {
    a: i64,
    b: String,
}

impl Object {
    fn example() -> Self {
        Self {
            a: 1,
            b: "Hello".to_string(),
            c: 2.3,
            d: 4,
            e: 'J',
            f: true,
            g: vec![9, 1, 4],
            h: Object2 {
                a: 1,
                b: "Foo".to_string(),
            },
        }
    }
}

impl PredicateInput for Object {
    fn value_type() -> ValueType {
        ValueType::Record(&OBJECT)
    }

    fn to_value(&self) -> Value {
        Value::Record(
            Record::new(&OBJECT)
                .with("a", self.a)
                .with("b", self.b.clone())
                .with("c", self.c)
                .with("d", self.d)
                .with("e", self.e)
                .with("f", self.f)
                .with("g", self.g.clone())
                .with("h", self.h.clone()),
        )
    }
}

impl PredicateInput for Object2 {
    fn value_type() -> ValueType {
        ValueType::Record(&OBJECT2)
    }

    fn to_value(&self) -> Value {
        Value::Record(
            Record::new(&OBJECT2)
                .with("a", self.a)
                .with("b", self.b.clone()),
        )
    }
}

// ── Configurations ──

fn minimal_config() -> Configuration {
    Configuration::standard()
}

fn object_only_config() -> Configuration {
    let mut config = Configuration::standard();
    config.allow_type(Object::value_type(), OBJECT_ID).unwrap();
    config
}

fn standard_config() -> Configuration {
    let mut config = object_only_config();
    config.allow_accessor(object_field("a"), "Object.a").unwrap();
    config.allow_accessor(object_field("b"), "Object.b").unwrap();
    config.allow_accessor(object_field("c"), "Object.c").unwrap();
    config
}

fn provided_config(recursive: bool) -> Configuration {
    let mut config = object_only_config();
    config
        .allow_accessors_provided_by(&OBJECT, recursive)
        .unwrap();
    config
}

fn uuid_config() -> Configuration {
    let mut config = minimal_config();
    config.allow_type(ValueType::Uuid, "uuid.Uuid").unwrap();
    config
}

fn mismatched_config() -> Configuration {
    let mut config = minimal_config();
    // Identifier of `a`, bound to an accessor with a different signature.
    config.allow_accessor(object_field("b"), "Object.a").unwrap();
    config
}

fn extension_config() -> Configuration {
    let mut config = standard_config();
    config
        .allow_partial_type(
            TypeConstructor::Extension("NonStandardExpression"),
            "tests.NonStandardExpression",
        )
        .unwrap();
    config
}

// ── Helpers ──

fn encode_decode<Input: PredicateInput>(
    predicate: &Predicate<Input>,
    encoding: &Configuration,
    decoding: &Configuration,
) -> Result<Predicate<Input>, CodingError> {
    let bytes = encode(predicate, encoding)?;
    decode(&bytes, decoding)
}

fn round_trip<Input: PredicateInput>(
    predicate: &Predicate<Input>,
    config: &Configuration,
) -> Result<Predicate<Input>, CodingError> {
    encode_decode(predicate, config, config)
}

/// `$0.<field> == value`
fn object_field_equals<T: PredicateInput>(
    field: &'static str,
    value: T,
) -> Predicate<Object> {
    Predicate::new(|input| {
        Expression::equal(
            Expression::key_path(input, object_field(field))?,
            Expression::value(value)?,
        )
    })
    .unwrap()
}

fn assert_same_behavior<Input: PredicateInput>(
    decoded: &Predicate<Input>,
    original: &Predicate<Input>,
    input: &Input,
) {
    assert_eq!(
        decoded.evaluate(input).unwrap(),
        original.evaluate(input).unwrap()
    );
}

// ── Scenarios ──

#[test]
fn basic_encode_decode() {
    let predicate = object_field_equals("a", 2);
    let decoded = round_trip(&predicate, &standard_config()).unwrap();

    let mut object = Object::example();
    assert_same_behavior(&decoded, &predicate, &object);
    object.a = 2;
    assert!(decoded.evaluate(&object).unwrap());
    assert_same_behavior(&decoded, &predicate, &object);
    object.a = 3;
    assert_same_behavior(&decoded, &predicate, &object);

    assert!(round_trip(&predicate, &Configuration::new()).is_err());
    assert!(round_trip(&predicate, &minimal_config()).is_err());
}

#[test]
fn disallowed_key_path() {
    // $0.f
    let predicate = Predicate::<Object>::new(|input| {
        Expression::key_path(input, object_field("f"))
    })
    .unwrap();
    assert!(round_trip(&predicate, &minimal_config()).is_err());
    match round_trip(&predicate, &standard_config()) {
        Err(CodingError::AccessorNotAllowed { accessor }) => {
            assert_eq!(accessor, "\\Object.f");
        }
        other => panic!("expected AccessorNotAllowed, got {:?}", other),
    }

    // $0.a == 1, encoded where `a` is allowed, decoded where it is not.
    let predicate = object_field_equals("a", 1);
    let err = encode_decode(&predicate, &standard_config(), &minimal_config()).unwrap_err();
    match &err {
        CodingError::KeyPathNotAllowed { identifier } => assert_eq!(identifier, "Object.a"),
        other => panic!("expected KeyPathNotAllowed, got {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "an accessor for the 'Object.a' identifier is not in the provided allowlist"
    );
}

#[test]
fn key_path_type_mismatch() {
    let predicate = object_field_equals("a", 2);
    round_trip(&predicate, &standard_config()).unwrap();

    let err = encode_decode(&predicate, &standard_config(), &mismatched_config()).unwrap_err();
    match &err {
        CodingError::KeyPathTypeMismatch {
            identifier,
            accessor,
            actual,
            required,
        } => {
            assert_eq!(identifier, "Object.a");
            assert_eq!(accessor, "\\Object.b");
            assert_eq!(actual, "Object -> String");
            assert_eq!(required, "Object -> Int");
        }
        other => panic!("expected KeyPathTypeMismatch, got {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "accessor '\\Object.b' (Object -> String) for identifier 'Object.a' did not match \
         the expression's requirement for Object -> Int"
    );
}

#[test]
fn disallowed_type() {
    // $0 is Uuid
    let predicate = Predicate::<Object>::new(|input| {
        Expression::type_check(input, ValueType::Uuid)
    })
    .unwrap();

    assert!(round_trip(&predicate, &minimal_config()).is_err());
    match round_trip(&predicate, &standard_config()) {
        Err(CodingError::TypeNotAllowed { identifier, path }) => {
            assert_eq!(identifier, "Uuid");
            assert_eq!(path, "/expr.TypeCheck");
        }
        other => panic!("expected TypeNotAllowed, got {:?}", other),
    }

    let err = encode_decode(&predicate, &uuid_config(), &minimal_config()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "the 'uuid.Uuid' type is not in the provided allowlist (required by /expr.TypeCheck)"
    );

    let decoded = round_trip(&predicate, &uuid_config()).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());
    assert!(!decoded.evaluate(&Object::example()).unwrap());
}

#[test]
fn uuid_literals_round_trip_when_allowed() {
    let id = uuid::Uuid::new_v4();
    let predicate = Predicate::<uuid::Uuid>::new(|input| {
        Expression::equal(input, Expression::value(id)?)
    })
    .unwrap();

    assert!(round_trip(&predicate, &minimal_config()).is_err());
    let decoded = round_trip(&predicate, &uuid_config()).unwrap();
    assert!(decoded.evaluate(&id).unwrap());
    assert!(!decoded.evaluate(&uuid::Uuid::new_v4()).unwrap());
}

#[test]
fn provided_properties() {
    // $0.a == 2: `a` is not in Object's provided set.
    let predicate = object_field_equals("a", 2);
    assert!(round_trip(&predicate, &provided_config(false)).is_err());
    assert!(round_trip(&predicate, &provided_config(true)).is_err());

    // $0.f == false
    let predicate = object_field_equals("f", false);
    let decoded = round_trip(&predicate, &provided_config(false)).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());
    let decoded = round_trip(&predicate, &provided_config(true)).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());

    // $0.h.a == 1: needs Object2's provided set as well.
    let predicate = Predicate::<Object>::new(|input| {
        let h = Expression::key_path(input, object_field("h"))?;
        Expression::equal(
            Expression::key_path(h, object2_field("a"))?,
            Expression::value(1)?,
        )
    })
    .unwrap();
    assert!(round_trip(&predicate, &provided_config(false)).is_err());
    let decoded = round_trip(&predicate, &provided_config(true)).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());
    assert!(decoded.evaluate(&Object::example()).unwrap());
}

#[test]
fn default_allowlist() {
    let config = minimal_config();

    // $0.isEmpty
    let predicate = Predicate::<String>::new(|input| {
        Expression::key_path(input, standard::is_empty(&ValueType::String).unwrap())
    })
    .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &"Hello world".to_string());
    assert_same_behavior(&decoded, &predicate, &String::new());

    // $0.count > 2
    let predicate = Predicate::<String>::new(|input| {
        Expression::comparison(
            Expression::key_path(input, standard::count(&ValueType::String).unwrap())?,
            Expression::value(2)?,
            ComparisonOperator::GreaterThan,
        )
    })
    .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &"Hello world".to_string());
    assert_same_behavior(&decoded, &predicate, &"Hi".to_string());

    // $0 == $0 over a record: the input type needs no entry of its own.
    let predicate = Predicate::<Object>::new(|input| Expression::equal(input.clone(), input))
        .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());

    let letters: Vec<String> = vec!["A".to_string(), "B".to_string(), "C".to_string()];

    // $0.isEmpty over Array<String>
    let predicate = Predicate::<Vec<String>>::new(|input| {
        let is_empty = standard::is_empty(input.output()).unwrap();
        Expression::key_path(input, is_empty)
    })
    .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &letters);

    // $0.count == 2 over Array<String>
    let predicate = Predicate::<Vec<String>>::new(|input| {
        let count = standard::count(input.output()).unwrap();
        Expression::equal(Expression::key_path(input, count)?, Expression::value(2)?)
    })
    .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &letters);
    assert_same_behavior(&decoded, &predicate, &letters[..2].to_vec());

    let numbers: BTreeMap<String, i64> = [("A", 1), ("B", 2), ("C", 3)]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    // $0.isEmpty over Dictionary<String, Int>
    let predicate = Predicate::<BTreeMap<String, i64>>::new(|input| {
        let is_empty = standard::is_empty(input.output()).unwrap();
        Expression::key_path(input, is_empty)
    })
    .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &numbers);

    // $0.count == 2 over Dictionary<String, Int>
    let predicate = Predicate::<BTreeMap<String, i64>>::new(|input| {
        let count = standard::count(input.output()).unwrap();
        Expression::equal(Expression::key_path(input, count)?, Expression::value(2)?)
    })
    .unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();
    assert_same_behavior(&decoded, &predicate, &numbers);
}

#[test]
fn asymmetric_identifiers() {
    let predicate = object_field_equals("a", 1);

    let mut producer = Configuration::standard();
    producer.allow_accessor(object_field("a"), "producer.a").unwrap();

    match encode_decode(&predicate, &producer, &standard_config()) {
        Err(CodingError::KeyPathNotAllowed { identifier }) => {
            assert_eq!(identifier, "producer.a");
        }
        other => panic!("expected KeyPathNotAllowed, got {:?}", other),
    }

    // Same identifiers on both sides, different spelling from the default.
    let decoded = round_trip(&predicate, &producer).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());

    // A consumer that knows both spellings decodes either producer.
    let mut consumer = standard_config();
    consumer.allow_accessor(object_field("a"), "producer.a").unwrap();
    let decoded = encode_decode(&predicate, &producer, &consumer).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());
    let decoded = encode_decode(&predicate, &standard_config(), &consumer).unwrap();
    assert_same_behavior(&decoded, &predicate, &Object::example());
}

#[test]
fn compound_predicate_round_trip() {
    // ($0.c >= 2.0 && $0.g.contains(4)) || !($0.b != "Hello")
    let predicate = Predicate::<Object>::new(|input| {
        let c = Expression::comparison(
            Expression::key_path(input.clone(), object_field("c"))?,
            Expression::value(2.0)?,
            ComparisonOperator::GreaterThanOrEqual,
        )?;
        let contains = Expression::sequence_contains(
            Expression::key_path(input.clone(), object_field("g"))?,
            Expression::value(4)?,
        )?;
        let b = Expression::not_equal(
            Expression::key_path(input, object_field("b"))?,
            Expression::value("Hello")?,
        )?;
        Expression::disjunction(
            Expression::conjunction(c, contains)?,
            Expression::negation(b)?,
        )
    })
    .unwrap();

    let mut config = standard_config();
    config.allow_accessor(object_field("g"), "Object.g").unwrap();
    let decoded = round_trip(&predicate, &config).unwrap();

    let mut object = Object::example();
    assert_same_behavior(&decoded, &predicate, &object);
    object.c = 1.0;
    object.b = "Bye".to_string();
    assert_same_behavior(&decoded, &predicate, &object);
    assert!(!decoded.evaluate(&object).unwrap());
}

// ── Malformed data ──

fn decode_object(json: &str, config: &Configuration) -> CodingError {
    decode::<Object>(json.as_bytes(), config).unwrap_err()
}

fn assert_rejected_with(json: &str, config: &Configuration, reason: &str) {
    let err = decode_object(json, config);
    assert!(
        err.to_string().contains(reason),
        "error '{}' did not contain reason '{}'",
        err,
        reason
    );
}

#[test]
fn malformed_data() {
    // structure is not an expression
    assert_rejected_with(
        r#"{"records": [{"variable": {"key": 0}, "expression": 0, "structure": "core.Int"}]}"#,
        &standard_config(),
        "this expression is unsupported by this predicate",
    );

    // conjunction is missing its generic arguments
    assert_rejected_with(
        r#"{"records": [{"variable": {"key": 0}, "expression": 0,
            "structure": "expr.Conjunction"}]}"#,
        &standard_config(),
        "reconstruction of 'expr.Conjunction' with the arguments [] failed",
    );

    // conjunction's generic arguments violate its constraints
    assert_rejected_with(
        r#"{"records": [{"variable": {"key": 0}, "expression": 0,
            "structure": {"identifier": "expr.Conjunction", "args": ["core.Int", "core.Int"]}}]}"#,
        &standard_config(),
        "reconstruction of 'expr.Conjunction' with the arguments [core.Int, core.Int] failed",
    );

    // allow-listed, but not a standard expression
    assert_rejected_with(
        r#"{"records": [{"variable": {"key": 0}, "expression": 0,
            "structure": "tests.NonStandardExpression"}]}"#,
        &extension_config(),
        "this expression is unsupported by this predicate",
    );

    // an unlisted identifier is reported, never guessed
    match decode_object(
        r#"{"records": [{"variable": {"key": 0}, "expression": 0,
            "structure": "tests.NonStandardExpression"}]}"#,
        &standard_config(),
    ) {
        CodingError::TypeNotAllowed { identifier, path } => {
            assert_eq!(identifier, "tests.NonStandardExpression");
            assert_eq!(path, "/");
        }
        other => panic!("expected TypeNotAllowed, got {:?}", other),
    }

    // not an archive at all
    match decode_object(r#"{"records": "none"}"#, &standard_config()) {
        CodingError::MalformedArchive(_) => {}
        other => panic!("expected MalformedArchive, got {:?}", other),
    }
}

#[test]
fn empty_configuration_rejects_everything() {
    let predicate = Predicate::<bool>::new(Ok).unwrap();
    let bytes = encode(&predicate, &minimal_config()).unwrap();
    match decode::<bool>(&bytes, &Configuration::new()) {
        Err(CodingError::TypeNotAllowed { identifier, path }) => {
            assert_eq!(identifier, "expr.Variable");
            assert_eq!(path, "/");
        }
        other => panic!("expected TypeNotAllowed, got {:?}", other),
    }
}

#[test]
fn builders_reject_ill_typed_trees() {
    let err = Predicate::<Object>::new(|input| {
        Expression::conjunction(
            Expression::key_path(input, object_field("a"))?,
            Expression::value(true)?,
        )
    })
    .unwrap_err();
    match err {
        PredicateError::InvalidOperands { expression, .. } => assert_eq!(expression, "Conjunction"),
        other => panic!("expected InvalidOperands, got {:?}", other),
    }
}

#[test]
fn shared_configuration_decodes_concurrently() {
    let config = standard_config();
    let predicate = object_field_equals("a", 1);
    let bytes = encode(&predicate, &config).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let config = &config;
                let bytes = &bytes;
                scope.spawn(move || {
                    let decoded = decode::<Object>(bytes, config).unwrap();
                    let mut object = Object::example();
                    object.a = i;
                    decoded.evaluate(&object).unwrap()
                })
            })
            .collect();
        let results: Vec<bool> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(results, vec![false, true, false, false]);
    });
}
