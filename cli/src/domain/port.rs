//! Bridge port arbitration.
//!
//! Every instance has a formula port (`base + index*2`), but instances that
//! share one bridge daemon sometimes come up elsewhere. [`PortResolver`]
//! decides which live port belongs to an instance using only the data handed
//! to it, so identical inputs always give the same answer.

use std::collections::BTreeSet;

use crate::domain::bridge::{BridgeDevice, live_ports};
use crate::domain::console::ConsoleEntry;

/// Default first bridge port.
pub const DEFAULT_BASE_PORT: u16 = 5555;

/// How a port was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    /// The formula port is live.
    Expected,
    /// Only one device is live, so it must be ours.
    SingleDevice,
    /// Exactly one live port is unclaimed by other running instances.
    Disambiguated,
    /// Nearest live port to the formula port.
    Closest,
}

/// A resolved port and how it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortResolution {
    pub port: u16,
    pub source: PortSource,
}

impl PortResolution {
    /// Whether the port differs from what the formula predicted.
    #[must_use]
    pub fn is_adopted(&self) -> bool {
        self.source != PortSource::Expected
    }
}

/// Maps instance indices to bridge ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortResolver {
    base_port: u16,
}

impl Default for PortResolver {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT)
    }
}

impl PortResolver {
    #[must_use]
    pub fn new(base_port: u16) -> Self {
        Self { base_port }
    }

    #[must_use]
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// `base_port + index*2`, saturating at `u16::MAX`.
    #[must_use]
    pub fn expected_port(&self, index: u32) -> u16 {
        let port = u32::from(self.base_port).saturating_add(index.saturating_mul(2));
        u16::try_from(port).unwrap_or(u16::MAX)
    }

    /// Decide which live port belongs to instance `name` at `index`.
    ///
    /// 1. The formula port, if live.
    /// 2. The only live port, if exactly one device is attached.
    /// 3. Ports not claimed by the formula port of another running instance:
    ///    if exactly one remains, that one.
    /// 4. The live port closest to the formula port (lower port on ties),
    ///    preferring unclaimed ports when any exist.
    ///
    /// Returns `None` when no device is ready.
    #[must_use]
    pub fn resolve_actual(
        &self,
        name: &str,
        index: u32,
        live: &[BridgeDevice],
        running: &[ConsoleEntry],
    ) -> Option<PortResolution> {
        let expected = self.expected_port(index);
        let ports = live_ports(live);

        if ports.contains(&expected) {
            return Some(PortResolution {
                port: expected,
                source: PortSource::Expected,
            });
        }
        if ports.len() == 1 {
            return ports.first().map(|&port| PortResolution {
                port,
                source: PortSource::SingleDevice,
            });
        }

        let claimed: BTreeSet<u16> = running
            .iter()
            .filter(|entry| entry.name != name)
            .map(|entry| self.expected_port(entry.index))
            .collect();
        let unclaimed: BTreeSet<u16> = ports.difference(&claimed).copied().collect();
        if unclaimed.len() == 1 {
            return unclaimed.first().map(|&port| PortResolution {
                port,
                source: PortSource::Disambiguated,
            });
        }

        let pool = if unclaimed.is_empty() { &ports } else { &unclaimed };
        pool.iter()
            .min_by_key(|&&port| (port.abs_diff(expected), port))
            .map(|&port| PortResolution {
                port,
                source: PortSource::Closest,
            })
    }
}
