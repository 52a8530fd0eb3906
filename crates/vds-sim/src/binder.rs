//! Matching load profiles to the loads of the compiled circuit.

use std::collections::BTreeSet;

use tracing::{debug, info};
use vds_core::name::normalize;
use vds_core::{
    Connection, LoadProfile, ObjectName, Phase, ProfileSet, ProfileUnits, VdsError, VdsResult,
};
use vds_engine::PowerFlowEngine;
use vds_io::LoadLabel;

/// A circuit load paired with the profile that drives it.
#[derive(Debug, Clone)]
pub struct BoundLoad<'a> {
    /// Load name as the engine reports it.
    pub name: String,
    pub profile: &'a LoadProfile,
    pub phase: Phase,
    pub connection: Connection,
    pub phase_count: usize,
    pub base_kv: f64,
    /// kW from the circuit definition, before any profile is applied.
    pub nominal_kw: f64,
    pub units: ProfileUnits,
}

impl BoundLoad<'_> {
    pub fn element(&self) -> ObjectName {
        ObjectName::load(&self.name)
    }

    /// Loadshape the profile is written under.
    pub fn loadshape(&self) -> ObjectName {
        ObjectName::loadshape(self.profile.load())
    }

    pub fn meter_count(&self) -> usize {
        self.phase.meter_count()
    }

    /// kW setpoint for `step`.
    pub fn kw_at(&self, step: usize) -> f64 {
        self.units
            .to_kw(self.profile.value_at(step), self.nominal_kw)
    }

    pub fn label(&self) -> LoadLabel {
        LoadLabel {
            load_name: self.element().object(),
            loadshape_name: self.loadshape().object(),
            base_kv: self.base_kv,
            connection: self.connection.to_string(),
            meter_count: self.meter_count() as i64,
            phase_count: self.phase_count as i64,
            phase_name: self.phase.name().to_string(),
            phase_value: self.phase.value(),
            profile_name: self.profile.load().to_string(),
            units: self.units.to_string(),
        }
    }
}

/// Pair every profile with a circuit load.
///
/// Fails with [`VdsError::UnknownLoad`] when a profile names a load the
/// circuit lacks and [`VdsError::MissingProfile`] when a circuit load has no
/// profile. Names match case-insensitively. Bound loads follow the engine's
/// load order. No solve is issued.
pub fn bind<'a, E>(
    engine: &mut E,
    profiles: &'a ProfileSet,
    units: ProfileUnits,
) -> VdsResult<Vec<BoundLoad<'a>>>
where
    E: PowerFlowEngine + ?Sized,
{
    let names = engine.load_names()?;
    let topology: BTreeSet<String> = names.iter().map(|n| normalize(n)).collect();
    debug!("Circuit defines {} loads", topology.len());

    if let Some(profile) = profiles
        .iter()
        .find(|p| !topology.contains(&normalize(p.load())))
    {
        return Err(VdsError::UnknownLoad {
            load: profile.load().to_string(),
        });
    }

    let mut seen = BTreeSet::new();
    let mut bound = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(normalize(&name)) {
            continue;
        }
        let profile = profiles
            .get(&name)
            .ok_or_else(|| VdsError::MissingProfile { load: name.clone() })?;
        bound.push(describe(engine, name, profile, units)?);
    }

    info!(
        "Bound {} loads ({} voltage channels)",
        bound.len(),
        bound.iter().map(BoundLoad::meter_count).sum::<usize>()
    );
    Ok(bound)
}

fn describe<'a, E>(
    engine: &mut E,
    name: String,
    profile: &'a LoadProfile,
    units: ProfileUnits,
) -> VdsResult<BoundLoad<'a>>
where
    E: PowerFlowEngine + ?Sized,
{
    let element = ObjectName::load(&name);
    let phase_count = engine.numeric_property(&element, "phases")?;
    if phase_count.fract() != 0.0 || !(1.0..=3.0).contains(&phase_count) {
        return Err(VdsError::Parse(format!(
            "load '{name}' has unsupported phase count {phase_count}"
        )));
    }
    let phase_count = phase_count as usize;
    let bus1 = engine.property(&element, "bus1")?;
    let phase = Phase::from_bus(phase_count, &bus1)?;
    let connection: Connection = engine.property(&element, "conn")?.parse()?;
    let base_kv = engine.numeric_property(&element, "kV")?;
    let nominal_kw = engine.numeric_property(&element, "kW")?;

    Ok(BoundLoad {
        name,
        profile,
        phase,
        connection,
        phase_count,
        base_kv,
        nominal_kw,
        units,
    })
}
