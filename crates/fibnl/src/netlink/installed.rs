//! Metrics of the unicast routes the reactor knows to be installed.
//!
//! The kernel keeps IP routes with equal protocol and destination apart
//! when their metrics differ, so an add with a new metric does not replace
//! the old entry. The reactor records metrics from acknowledged adds and
//! from route dumps, and after an add it deletes whatever else it knows of
//! under the same protocol and destination.

use std::collections::{BTreeMap, HashMap};

use ipnet::IpNet;

use super::route::{Route, RouteDest};

#[derive(Debug, Default)]
pub(crate) struct InstalledRoutes {
    /// (protocol, destination) -> metric -> table.
    metrics: HashMap<(u8, IpNet), BTreeMap<u32, u32>>,
}

impl InstalledRoutes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Remember that the kernel holds `route`.
    pub(crate) fn record(&mut self, route: &Route) {
        let (RouteDest::Unicast(net), Some(metric)) = (route.dest, route.metric()) else {
            return;
        };
        self.metrics
            .entry((route.protocol, net))
            .or_default()
            .insert(metric, route.table);
    }

    /// Deletes for every known entry sharing `route`'s protocol and
    /// destination under another metric, lowest metric first.
    pub(crate) fn stale(&self, route: &Route) -> Vec<Route> {
        let (RouteDest::Unicast(net), Some(metric)) = (route.dest, route.metric()) else {
            return Vec::new();
        };
        let Some(known) = self.metrics.get(&(route.protocol, net)) else {
            return Vec::new();
        };
        known
            .iter()
            .filter(|(m, _)| **m != metric)
            .map(|(m, table)| Route::unicast(net, route.protocol).table(*table).priority(*m))
            .collect()
    }

    /// A delete of `route` succeeded. Without a priority the kernel removes
    /// the lowest metric.
    pub(crate) fn remove(&mut self, route: &Route) {
        let RouteDest::Unicast(net) = route.dest else {
            return;
        };
        let key = (route.protocol, net);
        let Some(known) = self.metrics.get_mut(&key) else {
            return;
        };
        match route.priority {
            Some(metric) => {
                known.remove(&metric);
            }
            None => {
                known.pop_first();
            }
        }
        if known.is_empty() {
            self.metrics.remove(&key);
        }
    }

    /// The kernel has nothing matching `route`'s protocol and destination,
    /// or nothing under its explicit priority.
    pub(crate) fn forget(&mut self, route: &Route) {
        match route.priority {
            Some(_) => self.remove(route),
            None => {
                if let RouteDest::Unicast(net) = route.dest {
                    self.metrics.remove(&(route.protocol, net));
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.metrics.values().map(BTreeMap::len).sum()
    }
}
