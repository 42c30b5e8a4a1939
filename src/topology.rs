use crate::control::DEFAULT_VEHICLE_LENGTH;
use crate::{ControlPlane, Engine, Error, Result, VehicleData};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Who a platoon member receives reference data from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TopologyEntry {
    /// The platoon leader.
    pub leader: Option<String>,
    /// The vehicle directly ahead.
    pub front: Option<String>,
}

/// The communication topology of one or more platoons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Topology {
    entries: BTreeMap<String, TopologyEntry>,
}

/// Settings of the emulated V2V channel.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RelayConfig {
    /// Number of simulation steps between two relay passes.
    pub period: u64,
    /// The step within each period at which the relay runs.
    pub phase: u64,
    /// The vehicle length subtracted from GPS distances, in m.
    pub vehicle_length: f64,
}

/// Propagates leader and front vehicle data to every platoon member.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relay {
    config: RelayConfig,
}

/// The outcome of one relay pass.
#[derive(Debug, Default)]
pub struct RelayReport {
    /// Number of members that received leader data.
    pub leader_updates: usize,
    /// Number of members that received front data.
    pub front_updates: usize,
    /// Members whose update failed. Other members are unaffected.
    pub failed: Vec<(String, Error)>,
}

impl TopologyEntry {
    /// An entry with both a leader and a front vehicle.
    pub fn new(leader: &str, front: &str) -> Self {
        Self {
            leader: Some(leader.to_owned()),
            front: Some(front.to_owned()),
        }
    }
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds the topology of a single platoon, given in driving order from the leader.
    /// The leader gets an empty entry; every other member follows the one ahead of it.
    pub fn platoon<S: AsRef<str>>(members: &[S]) -> Self {
        let mut topology = Self::new();
        if let Some(leader) = members.first() {
            let leader = leader.as_ref();
            topology.insert(leader, TopologyEntry::default());
            for pair in members.windows(2) {
                topology.insert(pair[1].as_ref(), TopologyEntry::new(leader, pair[0].as_ref()));
            }
        }
        topology
    }

    /// Sets the entry of a vehicle, returning the previous one.
    pub fn insert(&mut self, vid: &str, entry: TopologyEntry) -> Option<TopologyEntry> {
        self.entries.insert(vid.to_owned(), entry)
    }

    /// Removes a vehicle from the topology.
    pub fn remove(&mut self, vid: &str) -> Option<TopologyEntry> {
        self.entries.remove(vid)
    }

    /// Gets the entry of a vehicle.
    pub fn get(&self, vid: &str) -> Option<&TopologyEntry> {
        self.entries.get(vid)
    }

    /// Gets the entry of a vehicle, inserting an empty one if needed.
    pub fn entry_mut(&mut self, vid: &str) -> &mut TopologyEntry {
        match self.entries.entry(vid.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(TopologyEntry::default()),
        }
    }

    /// Sets the leader of a vehicle.
    pub fn set_leader(&mut self, vid: &str, leader: &str) {
        self.entry_mut(vid).leader = Some(leader.to_owned());
    }

    /// Sets the front vehicle of a vehicle.
    pub fn set_front(&mut self, vid: &str, front: &str) {
        self.entry_mut(vid).front = Some(front.to_owned());
    }

    /// Iterates over all entries in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopologyEntry)> {
        self.entries.iter().map(|(vid, entry)| (vid.as_str(), entry))
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the topology has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All vehicles driving behind `vid`, found by following front links.
    pub fn followers_of(&self, vid: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|member| member.as_str() != vid && self.is_behind(member, vid))
            .cloned()
            .collect()
    }

    /// Whether `vid` reaches `ahead` by following front links.
    fn is_behind(&self, vid: &str, ahead: &str) -> bool {
        let mut current = vid;
        // Bounded by the number of entries so a cyclic topology terminates
        for _ in 0..self.entries.len() {
            match self.get(current).and_then(|e| e.front.as_deref()) {
                Some(front) if front == ahead => return true,
                Some(front) => current = front,
                None => return false,
            }
        }
        false
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            period: 10,
            phase: 1,
            vehicle_length: DEFAULT_VEHICLE_LENGTH,
        }
    }
}

impl RelayConfig {
    /// Whether the relay should run on the given simulation step.
    pub fn is_due(&self, step: u64) -> bool {
        self.period != 0 && step % self.period == self.phase % self.period
    }
}

impl Relay {
    /// Creates a relay with the given settings.
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// The relay's settings.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Runs a relay pass if one is due on this step.
    pub fn step(
        &self,
        control: &ControlPlane,
        engine: &mut dyn Engine,
        topology: &Topology,
        step: u64,
    ) -> Option<RelayReport> {
        self.config
            .is_due(step)
            .then(|| self.communicate(control, engine, topology))
    }

    /// Pushes leader and front data to every member of the topology.
    ///
    /// Each vehicle is sampled at most once per pass, so every member sees the same broadcast.
    pub fn communicate(
        &self,
        control: &ControlPlane,
        engine: &mut dyn Engine,
        topology: &Topology,
    ) -> RelayReport {
        let mut samples = BTreeMap::new();
        let mut report = RelayReport::default();

        for (vid, entry) in topology.iter() {
            if let Err(err) = self.feed(control, engine, &mut samples, &mut report, vid, entry) {
                log::warn!("relay to {} failed: {}", vid, err);
                report.failed.push((vid.to_owned(), err));
            }
        }

        log::debug!(
            "relayed leader data to {} and front data to {} vehicle(s)",
            report.leader_updates,
            report.front_updates
        );
        report
    }

    /// Feeds a single member, counting each push as it reaches the engine.
    fn feed<'a>(
        &self,
        control: &ControlPlane,
        engine: &mut dyn Engine,
        samples: &mut BTreeMap<&'a str, VehicleData>,
        report: &mut RelayReport,
        vid: &'a str,
        entry: &'a TopologyEntry,
    ) -> Result<()> {
        if let Some(leader) = entry.leader.as_deref() {
            let data = Self::sample(control, engine, samples, leader)?;
            control.set_leader_vehicle_data(engine, vid, &data)?;
            control.set_leader_vehicle_fake_data(engine, vid, &data)?;
            report.leader_updates += 1;
        }
        if let Some(front) = entry.front.as_deref() {
            let data = Self::sample(control, engine, samples, front)?;
            control.set_front_vehicle_data(engine, vid, &data)?;
            let own = Self::sample(control, engine, samples, vid)?;
            let distance = own.distance_to(&data) - self.config.vehicle_length;
            control.set_front_vehicle_fake_data(engine, vid, &data, distance)?;
            report.front_updates += 1;
        }
        Ok(())
    }

    /// Reads a vehicle's state, reusing the sample taken earlier in the pass if there is one.
    fn sample<'a>(
        control: &ControlPlane,
        engine: &mut dyn Engine,
        samples: &mut BTreeMap<&'a str, VehicleData>,
        vid: &'a str,
    ) -> Result<VehicleData> {
        if let Some(data) = samples.get(vid) {
            return Ok(*data);
        }
        let data = control.get_vehicle_data(engine, vid)?;
        samples.insert(vid, data);
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn platoon_topology() {
        let topology = Topology::platoon(&["v.0", "v.1", "v.2"]);
        assert_eq!(topology.len(), 3);
        assert_eq!(topology.get("v.0"), Some(&TopologyEntry::default()));
        assert_eq!(topology.get("v.2"), Some(&TopologyEntry::new("v.0", "v.1")));
    }

    #[test]
    fn followers_follow_front_links() {
        let topology = Topology::platoon(&["v.0", "v.1", "v.2", "v.3", "v.4"]);
        assert_eq!(topology.followers_of("v.2"), vec!["v.3", "v.4"]);
        assert!(topology.followers_of("v.4").is_empty());
        assert_eq!(topology.followers_of("v.0").len(), 4);
    }

    #[test]
    fn cyclic_topology_terminates() {
        let mut topology = Topology::new();
        topology.set_front("a", "b");
        topology.set_front("b", "a");
        assert_eq!(topology.followers_of("c"), Vec::<String>::new());
    }

    #[test]
    fn relay_schedule() {
        let config = RelayConfig::default();
        let due = (0..25).filter(|step| config.is_due(*step)).collect::<Vec<_>>();
        assert_eq!(due, vec![1, 11, 21]);
        let never = RelayConfig {
            period: 0,
            ..config
        };
        assert!(!never.is_due(0));
    }
}
