use bytes::Bytes;
use commonware_splitter::{
    factory, BoxError, Declaration, Error, FromBytes, Length, Options, SplitCfg, Splitter, Text,
    Value, VariableLengthValue, VARIABLE,
};

fn text(length: usize) -> Declaration {
    Declaration::with_options(
        Text,
        Length::Fixed(length),
        Options::new().with("encoding", "utf-8"),
    )
}

#[derive(Debug)]
struct Thing {
    whatever: Bytes,
}

impl FromBytes for Thing {
    type Error = BoxError;

    fn from_bytes(bytes: Bytes, _: &Options) -> Result<Self, Self::Error> {
        Ok(Self { whatever: bytes })
    }
}

#[derive(Debug)]
struct DifferentLengths {
    what_it_be: Bytes,
}

impl FromBytes for DifferentLengths {
    type Error = BoxError;

    fn from_bytes(bytes: Bytes, _: &Options) -> Result<Self, Self::Error> {
        Ok(Self { what_it_be: bytes })
    }

    fn expected_length() -> Option<Length> {
        Some(VARIABLE)
    }
}

#[derive(Debug)]
struct NeedsOption {
    what_it_be: Bytes,
}

impl FromBytes for NeedsOption {
    type Error = BoxError;

    fn from_bytes(bytes: Bytes, options: &Options) -> Result<Self, Self::Error> {
        if options.bool("necessary").unwrap_or(false) {
            Ok(Self { what_it_be: bytes })
        } else {
            Err("necessary option missing".into())
        }
    }
}

fn variable(payload: &'static [u8]) -> VariableLengthValue {
    VariableLengthValue::new(payload).unwrap()
}

#[test]
fn test_splitting_one_message() {
    let splitter = Splitter::new([Declaration::fixed(11)]).unwrap();
    assert_eq!(
        splitter.split(b"hello world").unwrap(),
        vec![Value::from(b"hello world")]
    );
}

#[test]
fn test_splitting_hello_world() {
    let splitter = Splitter::new([5, 1, 5].map(Declaration::fixed)).unwrap();
    assert_eq!(
        splitter.split(b"hello world").unwrap(),
        vec![Value::from(b"hello"), Value::from(b" "), Value::from(b"world")]
    );
}

#[test]
fn test_split_into_strs() {
    let splitter = Splitter::new([text(5), text(1), text(5)]).unwrap();
    assert_eq!(
        splitter.split(b"hello world").unwrap(),
        vec![Value::from("hello"), Value::from(" "), Value::from("world")]
    );
}

#[test]
fn test_arbitrary_object() {
    let splitter = Splitter::new([
        Declaration::with(factory::<Thing>(), Length::Fixed(16)),
        Declaration::with(factory::<Thing>(), Length::Fixed(22)),
    ])
    .unwrap();
    let values = splitter
        .split(b"This is a Thing.This is another Thing.")
        .unwrap();
    let thing = values[0].downcast_ref::<Thing>().unwrap();
    let other = values[1].downcast_ref::<Thing>().unwrap();
    assert_eq!(thing.whatever, &b"This is a Thing."[..]);
    assert_eq!(other.whatever, &b"This is another Thing."[..]);
}

#[test]
fn test_arbitrary_object_as_single() {
    let splitter =
        Splitter::new([Declaration::with(factory::<Thing>(), Length::Fixed(16))]).unwrap();
    let values = splitter.split(b"This is a Thing.").unwrap();
    assert!(values[0].downcast_ref::<Thing>().is_some());

    let alone = splitter.split_single(b"This is a Thing.").unwrap();
    assert_eq!(
        alone.downcast_ref::<Thing>().unwrap().whatever,
        &b"This is a Thing."[..]
    );

    let splitter = Splitter::new([
        Declaration::with(factory::<Thing>(), Length::Fixed(16)),
        Declaration::with(factory::<Thing>(), Length::Fixed(22)),
    ])
    .unwrap();
    assert!(matches!(
        splitter.split_single(b"This is a Thing.This is another Thing."),
        Err(Error::CountMismatch { extra: 22, .. })
    ));
}

#[test]
fn test_too_many_bytes() {
    let splitter = Splitter::new([8, 7].map(Declaration::fixed)).unwrap();
    let err = splitter.split(b"This is 16 bytes").unwrap_err();
    assert!(matches!(
        err,
        Error::LengthMismatch {
            expected: 15,
            actual: 16,
            ..
        }
    ));
    assert!(err.to_string().contains("did you mean to return the remainder?"));
}

#[test]
fn test_get_remainder_as_bytes() {
    let splitter = Splitter::new([Declaration::fixed(16)]).unwrap();
    let (values, remainder) = splitter
        .split_cfg(
            b"This is 16 bytesthis is an addendum",
            SplitCfg::remainder(),
        )
        .unwrap();
    assert_eq!(
        values,
        vec![
            Value::from(b"This is 16 bytes"),
            Value::from(b"this is an addendum")
        ]
    );
    assert_eq!(remainder, &b"this is an addendum"[..]);
}

#[test]
fn test_not_enough_bytes() {
    let splitter = Splitter::new([10, 7].map(Declaration::fixed)).unwrap();
    assert!(matches!(
        splitter.split_cfg(b"This is 16 bytes", SplitCfg::remainder()),
        Err(Error::InsufficientBytes {
            expected: 17,
            actual: 16,
            ..
        })
    ));
}

#[cfg(feature = "json")]
#[test]
fn test_decode_json_remainder() {
    use commonware_splitter::{Config, Json};
    use std::sync::Arc;

    let cfg = Config {
        remainder: Some(Arc::new(Json)),
        ..Config::default()
    };
    let splitter = Splitter::init([Declaration::fixed(16)], cfg).unwrap();
    let (values, _) = splitter
        .split_cfg(br#"This is 16 bytes{"something": true}"#, SplitCfg::decode())
        .unwrap();
    assert_eq!(values[0], Value::from(b"This is 16 bytes"));
    let appended = values[1].as_record().unwrap();
    assert_eq!(appended.get("something"), Some(&Value::Bool(true)));

    assert!(matches!(
        splitter.split_cfg(b"This is 16 bytes{oops", SplitCfg::decode()),
        Err(Error::RemainderDecode { .. })
    ));
}

#[test]
fn test_add_splitters() {
    let splitter_8 = Splitter::new([Declaration::fixed(8)]).unwrap();
    let splitter_16 = (&splitter_8 + &splitter_8).unwrap();
    assert_eq!(
        splitter_16.split(b"8 bytes.8 bytes.").unwrap(),
        vec![Value::from(b"8 bytes."), Value::from(b"8 bytes.")]
    );
}

#[test]
fn test_multiply_splitters() {
    let buffer = b"8 bytes.".repeat(5);
    let splitter = Splitter::new([Declaration::fixed(8)]).unwrap();
    let splitter_40 = (&splitter * 5).unwrap();
    let joined: Vec<u8> = splitter_40
        .split(&buffer)
        .unwrap()
        .into_iter()
        .flat_map(|value| value.into_bytes().unwrap())
        .collect();
    assert_eq!(joined, buffer);
}

#[test]
fn test_repeating_splitter() {
    let splitter = Splitter::new([Declaration::fixed(13)]).unwrap();
    let results = splitter.repeat(&b"peace at dawn".repeat(50)).unwrap();
    assert_eq!(results.len(), 50);
    for result in results {
        assert_eq!(result, Value::from(b"peace at dawn"));
    }

    let distinct = splitter.repeat_set(&b"peace at dawn".repeat(50)).unwrap();
    assert_eq!(distinct.len(), 1);
}

#[test]
fn test_repeat_multiple_fields() {
    let splitter = Splitter::new([2, 1].map(Declaration::fixed)).unwrap();
    let results = splitter.repeat(b"ab1cd2").unwrap();
    assert_eq!(
        results,
        vec![
            Value::List(vec![Value::from(b"ab"), Value::from(b"1")]),
            Value::List(vec![Value::from(b"cd"), Value::from(b"2")]),
        ]
    );
}

#[test]
fn test_variable_length_in_first_position() {
    let first = variable(b"Sometimes, it's short.");
    let second = variable(b"Sometimes, it's really really really really long.");
    let both = first.clone() + second.to_bytes();

    let splitter = Splitter::new([Declaration::of(factory::<DifferentLengths>())]).unwrap();
    let things = splitter.repeat(&both).unwrap();
    assert_eq!(things.len(), 2);
    assert_eq!(
        first,
        things[0]
            .downcast_ref::<DifferentLengths>()
            .unwrap()
            .what_it_be
    );
    assert_eq!(
        second,
        things[1]
            .downcast_ref::<DifferentLengths>()
            .unwrap()
            .what_it_be
    );
}

#[test]
fn test_variable_length_after_fixed_length() {
    let splitter = Splitter::new([
        Declaration::fixed(16),
        Declaration::variable(),
        Declaration::fixed(22),
    ])
    .unwrap();

    let short = variable(b"short.");
    let long = variable(b"much much much much much longer.");
    let first = [
        &b"This is a Thing."[..],
        &short.to_bytes()[..],
        &b"This is another Thing."[..],
    ]
    .concat();
    let second = [
        &b"This is a Thing."[..],
        &long.to_bytes()[..],
        &b"This is another Thing."[..],
    ]
    .concat();

    let first = splitter.split(&first).unwrap();
    let second = splitter.split(&second).unwrap();
    assert_eq!(first[0], second[0]);
    assert_eq!(first[2], second[2]);
    assert_eq!(first[1], Value::Bytes(short.payload().clone()));
    assert_eq!(second[1], Value::Bytes(long.payload().clone()));
}

#[test]
fn test_passing_options_along_with_bytes() {
    let buffer = b"This is a thing that needs a kwarg.This is a thing that needs a kwarg.";

    let bad = Splitter::new([Declaration::with(
        factory::<NeedsOption>(),
        Length::Fixed(35),
    )])
    .unwrap();
    let bad_twice = (&bad * 2).unwrap();
    match bad_twice.split(buffer) {
        Err(Error::Construction {
            constructor,
            len,
            source,
            ..
        }) => {
            assert_eq!(constructor, "NeedsOption");
            assert_eq!(len, 35);
            assert_eq!(source.to_string(), "necessary option missing");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let good = Splitter::new([Declaration::with_options(
        factory::<NeedsOption>(),
        Length::Fixed(35),
        Options::new().with("necessary", true),
    )])
    .unwrap();
    let good_twice = (&good * 2).unwrap();
    let values = good_twice.split(buffer).unwrap();
    assert_eq!(
        values[0].downcast_ref::<NeedsOption>().unwrap().what_it_be,
        &buffer[..35]
    );
}

#[test]
fn test_bundle_and_dispense() {
    let items = [&b"llamas"[..], &b"dingos"[..], &b"christmas-tree"[..]];
    let bundled = VariableLengthValue::bundle(items).unwrap().to_bytes();
    assert_eq!(VariableLengthValue::dispense(&bundled).unwrap(), items);
}

#[test]
fn test_configuration_errors() {
    assert!(matches!(
        Splitter::new(Vec::<Declaration>::new()),
        Err(Error::NoFields)
    ));
    assert!(matches!(
        Splitter::new([Declaration::of(factory::<Thing>())]),
        Err(Error::UnknownLength(name)) if name == "Thing"
    ));
    assert!(matches!(
        Splitter::new([
            Declaration::of(factory::<DifferentLengths>()),
            Declaration::fixed(5)
        ]),
        Err(Error::AmbiguousDeclaration(name)) if name == "DifferentLengths"
    ));
    let splitter = Splitter::new([Declaration::fixed(1)]).unwrap();
    assert!(matches!(&splitter * 0, Err(Error::InvalidMultiplier(0))));
}

#[test]
fn test_length_overrun_names_field() {
    let splitter = Splitter::new([Declaration::fixed(2), Declaration::variable()]).unwrap();
    let err = splitter.split(b"ab\x00\x00\x01\x00tiny").unwrap_err();
    assert!(matches!(
        err,
        Error::LengthOverrun {
            claimed: 256,
            remaining: 4,
            ..
        }
    ));
    assert!(err.to_string().contains("VariableLengthValue"));
}

#[test]
fn test_partial_split() {
    let splitter = Splitter::new([text(5), text(1), text(5)]).unwrap();
    let (mut partial, remainder) = splitter.split_partial(b"hello world!", true).unwrap();
    assert_eq!(remainder, &b"!"[..]);
    assert_eq!(partial.pending(), vec!["#0", "#1", "#2"]);
    assert_eq!(partial.get_index(2).unwrap(), &Value::from("world"));
    assert_eq!(partial.pending(), vec!["#0", "#1"]);
    assert_eq!(
        partial.finish().unwrap(),
        vec![Value::from("hello"), Value::from(" "), Value::from("world")]
    );

    // Without a requested remainder, a fixed layout rejects the length up front like split
    assert!(matches!(
        splitter.split(b"hello world!"),
        Err(Error::LengthMismatch {
            expected: 11,
            actual: 12,
            ..
        })
    ));
    assert!(matches!(
        splitter.split_partial(b"hello world!", false),
        Err(Error::LengthMismatch {
            expected: 11,
            actual: 12,
            ..
        })
    ));
    assert!(matches!(
        splitter.split_partial(b"hello worl", false),
        Err(Error::LengthMismatch { .. })
    ));

    // Variable layouts can only notice leftovers after the last field
    let variable = Splitter::new([Declaration::variable()]).unwrap();
    assert!(matches!(
        variable.split_partial(b"\x00\x00\x00\x01ab", false),
        Err(Error::UnrequestedRemainder(1))
    ));
}
