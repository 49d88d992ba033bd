//! Network identifier to zone suffix mapping, and the set of served suffixes.

use std::collections::{BTreeSet, HashMap};

/// Maps controller network identifiers to the DNS suffix their clients are
/// published under. Keys are lowercased; suffixes are lowercased with any
/// trailing dot removed.
#[derive(Debug, Clone, Default)]
pub struct NetworkDomains {
    by_network: HashMap<String, String>,
    suffixes: BTreeSet<String>,
}

impl NetworkDomains {
    /// Build from a configured `network -> domain` map.
    pub fn new<'a, I>(networks: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let by_network: HashMap<String, String> = networks
            .into_iter()
            .map(|(network, domain)| (network.to_lowercase(), normalize(domain)))
            .collect();
        let suffixes = by_network.values().cloned().collect();

        Self {
            by_network,
            suffixes,
        }
    }

    /// Domain for a client's network, or `None` when the network is not published.
    pub fn map_domain(&self, network: &str) -> Option<&str> {
        self.by_network
            .get(&network.to_lowercase())
            .map(String::as_str)
    }

    /// Suffixes this instance answers for.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }

    /// Whether a query name falls under one of the served suffixes.
    ///
    /// This is a plain case-insensitive string suffix test on the name
    /// without its trailing dot.
    pub fn is_served(&self, name: &str) -> bool {
        let name = normalize(name);
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Lowercase and strip the trailing root dot.
pub(crate) fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_lowercase()
}
