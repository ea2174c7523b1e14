#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use commonware_splitter::{
    Checksum, Config, Declaration, Engine, HeaderChain, Record, SplitCfg, Splitter, Value,
    VariableLengthValue, Version,
};
use libfuzzer_sys::fuzz_target;

const MAX_FIELDS: usize = 16;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    // `None` declares a variable-length field
    widths: Vec<Option<u8>>,
    headers: bool,
    version: u16,
    buffer: Vec<u8>,
    items: Vec<Vec<u8>>,
}

fn splitter(input: &FuzzInput) -> Option<Splitter> {
    let declarations: Vec<Declaration> = input
        .widths
        .iter()
        .take(MAX_FIELDS)
        .map(|width| match width {
            Some(width) => Declaration::fixed(*width as usize),
            None => Declaration::variable(),
        })
        .collect();
    let mut cfg = Config::default();
    if input.headers {
        cfg.headers = HeaderChain::new()
            .with(Version)
            .ok()?
            .with(Checksum)
            .ok()?;
    }
    Splitter::init(declarations, cfg).ok()
}

fn fuzz(input: FuzzInput) {
    // Bundles always dispense back to their items
    let encoded = VariableLengthValue::bundle(&input.items)
        .expect("bundle rejected small items")
        .to_bytes();
    let dispensed = VariableLengthValue::dispense(&encoded).expect("failed to dispense a bundle");
    assert_eq!(dispensed, input.items);

    // Arbitrary bytes must never panic
    let _ = VariableLengthValue::dispense(&input.buffer);

    let Some(splitter) = splitter(&input) else {
        return;
    };
    let _ = splitter.repeat(&input.buffer);
    let _ = splitter.split_single(&input.buffer);
    let _ = splitter.metadata(&input.buffer);
    let _ = splitter.validate(&input.buffer, false);

    // A strict split partitions the payload exactly
    if let Ok(values) = splitter.split(&input.buffer) {
        let payload = splitter.strip(&input.buffer).expect("split succeeded");
        let total: usize = values
            .iter()
            .map(|value| value.as_bytes().map_or(0, Bytes::len))
            .sum();
        assert!(total <= payload.len());
    }

    // Partial splits agree with eager ones
    if let Ok((partial, remainder)) = splitter.split_partial(&input.buffer, true) {
        let (eager, eager_remainder) = splitter
            .split_cfg(&input.buffer, SplitCfg::remainder())
            .expect("partial split succeeded");
        assert_eq!(remainder, eager_remainder);
        let mut finished = partial.finish().expect("raw fields always construct");
        finished.push(Value::Bytes(remainder));
        assert_eq!(finished, eager);
    }

    // Rendered headers strip back to the payload
    let values = Record::new().with("version", input.version);
    if let Ok(rendered) = splitter.render(&input.buffer, &values) {
        assert_eq!(
            splitter.strip(&rendered).expect("rendered headers strip"),
            &input.buffer[..]
        );
        if input.headers {
            assert!(splitter.validate(&rendered, true).expect("checksum present"));
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
