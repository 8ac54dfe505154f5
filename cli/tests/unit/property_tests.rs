//! Property-based tests for port arbitration, serial selection and batching.

use proptest::prelude::*;

use emufleet::domain::batch::partition;
use emufleet::domain::bridge::{
    BridgeDevice, DeviceState, SerialMatch, canonical_serial, live_ports, select_serial,
};
use emufleet::domain::console::ConsoleEntry;
use emufleet::domain::port::{PortResolver, PortSource};

fn ready(serial: String) -> BridgeDevice {
    BridgeDevice::new(serial, DeviceState::Device)
}

fn running(index: u32) -> ConsoleEntry {
    ConsoleEntry {
        index,
        name: format!("Worker_{index}"),
        android_started: true,
        pid: Some(1000 + index),
    }
}

proptest! {
    /// Identical inputs always resolve to the same port.
    #[test]
    fn prop_resolution_is_deterministic(
        index in 0u32..32,
        ports in proptest::collection::btree_set(5555u16..5650, 0..6),
    ) {
        let resolver = PortResolver::default();
        let devices: Vec<BridgeDevice> = ports
            .iter()
            .map(|p| ready(canonical_serial("127.0.0.1", *p)))
            .collect();
        let others: Vec<ConsoleEntry> = (0..4).filter(|i| *i != index).map(running).collect();

        let first = resolver.resolve_actual("me", index, &devices, &others);
        let second = resolver.resolve_actual("me", index, &devices, &others);
        prop_assert_eq!(first, second);
        if let Some(resolution) = first {
            prop_assert!(ports.contains(&resolution.port));
        } else {
            prop_assert!(ports.is_empty());
        }
    }

    /// A live formula port always wins.
    #[test]
    fn prop_live_formula_port_is_expected(index in 0u32..64, base in 5000u16..6000) {
        let resolver = PortResolver::new(base);
        let expected = resolver.expected_port(index);
        let devices = vec![
            ready(canonical_serial("127.0.0.1", expected.saturating_add(2))),
            ready(canonical_serial("127.0.0.1", expected)),
        ];
        let resolution = resolver
            .resolve_actual("me", index, &devices, &[])
            .expect("live device");
        prop_assert_eq!(resolution.port, expected);
        prop_assert_eq!(resolution.source, PortSource::Expected);
        prop_assert!(!resolution.is_adopted());
    }

    /// The canonical serial is chosen over the emulator alias, and the two
    /// spellings count as one live port.
    #[test]
    fn prop_canonical_serial_wins_without_double_count(half in 2777u16..2820) {
        let console_port = half * 2;
        let port = console_port + 1;
        let devices = vec![
            ready(format!("emulator-{console_port}")),
            ready(canonical_serial("127.0.0.1", port)),
        ];
        let choice = select_serial(port, "127.0.0.1", &devices).expect("choice");
        prop_assert_eq!(choice.matched, SerialMatch::Canonical);
        prop_assert_eq!(choice.serial, canonical_serial("127.0.0.1", port));
        prop_assert_eq!(live_ports(&devices).len(), 1);
    }

    /// Partitioning keeps every item, in order, in groups no larger than `size`.
    #[test]
    fn prop_partition_preserves_items(
        items in proptest::collection::vec(0u32..1000, 0..40),
        size in 0usize..8,
    ) {
        let groups = partition(&items, size);
        let limit = size.max(1);
        prop_assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= limit));
        let flat: Vec<u32> = groups.into_iter().flatten().collect();
        prop_assert_eq!(flat, items);
    }
}

#[test]
fn single_live_device_is_adopted() {
    let resolver = PortResolver::default();
    let devices = vec![ready(canonical_serial("127.0.0.1", 5571))];
    let resolution = resolver
        .resolve_actual("Worker_1", 1, &devices, &[])
        .expect("resolution");
    assert_eq!(resolution.port, 5571);
    assert_eq!(resolution.source, PortSource::SingleDevice);
    assert!(resolution.is_adopted());
}
