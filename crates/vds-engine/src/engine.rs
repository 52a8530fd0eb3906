use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;
use vds_core::ObjectName;

use crate::commands;
use crate::{CommandChannel, EngineError, EngineResult};

/// Voltage magnitude at one node of a bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeVoltage {
    pub node: u32,
    pub magnitude: f64,
}

impl NodeVoltage {
    pub fn new(node: u32, magnitude: f64) -> Self {
        Self { node, magnitude }
    }
}

/// Operations the dataset pipeline needs from a power-flow simulator.
///
/// Implementations hold the simulator's single mutable circuit; callers own
/// one engine exclusively and call it sequentially.
pub trait PowerFlowEngine {
    /// Discard any loaded circuit and compile the master file at `master`.
    fn load_circuit(&mut self, master: &Path) -> EngineResult<()>;

    /// Names of every load in the active circuit, in circuit order.
    fn load_names(&mut self) -> EngineResult<Vec<String>>;

    /// Raw string value of a property of an element in the active circuit.
    fn property(&mut self, element: &ObjectName, key: &str) -> EngineResult<String>;

    fn set_load_kw(&mut self, load: &str, kw: f64) -> EngineResult<()>;

    /// Solve power flow for the current load values.
    fn solve(&mut self) -> EngineResult<()>;

    /// Voltage magnitudes of the bus at `element`'s `terminal` (1-based), one
    /// per node the bus defines. Nodes are identified by number; their order
    /// is the bus's own and may skip or permute 1, 2, 3.
    fn node_voltages(
        &mut self,
        element: &ObjectName,
        terminal: u32,
    ) -> EngineResult<Vec<NodeVoltage>>;

    /// Numeric property value.
    fn numeric_property(&mut self, element: &ObjectName, key: &str) -> EngineResult<f64> {
        let reply = self.property(element, key)?;
        commands::parse_number(&commands::query(element, key), &reply)
    }
}

/// [`PowerFlowEngine`] over OpenDSS text commands.
pub struct DssTextEngine<C> {
    channel: C,
    max_control_iter: u32,
    master: Option<PathBuf>,
    /// Node numbers per case-folded bus name, read once per circuit.
    bus_nodes: Option<HashMap<String, Vec<u32>>>,
    /// Node numbers per (case-folded object, terminal).
    terminal_nodes: HashMap<(String, u32), Vec<u32>>,
}

impl<C: CommandChannel> DssTextEngine<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            max_control_iter: 100,
            master: None,
            bus_nodes: None,
            terminal_nodes: HashMap::new(),
        }
    }

    pub fn with_max_control_iter(mut self, max_control_iter: u32) -> Self {
        self.max_control_iter = max_control_iter;
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Master file of the loaded circuit, if any.
    pub fn master(&self) -> Option<&Path> {
        self.master.as_deref()
    }

    /// Resolve the file named by an `export` reply; relative names are next to the master file.
    fn export_path(&self, reply: &str) -> PathBuf {
        let path = PathBuf::from(reply.trim());
        if path.is_absolute() {
            return path;
        }
        self.master
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.join(&path))
            .unwrap_or(path)
    }

    /// Run an `export` command and open the file it names.
    fn open_export(&mut self, command: &str) -> EngineResult<File> {
        let reply = self.channel.run(command)?;
        let reply = commands::check_export_reply(command, reply)?;
        let path = self.export_path(&reply);
        File::open(&path).map_err(|e| EngineError::Command {
            command: command.to_string(),
            message: format!("cannot open export {}: {e}", path.display()),
        })
    }

    /// Name of the bus connected to `element`'s `terminal`.
    fn terminal_bus(&mut self, element: &ObjectName, terminal: u32) -> EngineResult<String> {
        // Transformers list every winding's bus in `buses`
        let (key, index) = if element.class == "transformer" {
            ("buses".to_string(), (terminal as usize).checked_sub(1))
        } else {
            (format!("bus{terminal}"), Some(0))
        };
        let reply = self.property(element, &key)?;
        index
            .and_then(|i| commands::parse_bus_names(&reply).into_iter().nth(i))
            .ok_or_else(|| EngineError::Parse {
                command: commands::query(element, &key),
                reply,
            })
    }

    /// Node numbers of the bus at `element`'s `terminal`, in the order the
    /// `voltages` command reports them.
    fn terminal_nodes(&mut self, element: &ObjectName, terminal: u32) -> EngineResult<Vec<u32>> {
        let key = (element.object().to_lowercase(), terminal);
        if let Some(nodes) = self.terminal_nodes.get(&key) {
            return Ok(nodes.clone());
        }

        let bus = self.terminal_bus(element, terminal)?;
        let buses = match self.bus_nodes.take() {
            Some(buses) => buses,
            None => {
                let file = self.open_export(&commands::export_voltages())?;
                commands::parse_exported_bus_nodes(file)?
            }
        };
        let nodes = buses.get(&bus.to_lowercase()).cloned();
        self.bus_nodes = Some(buses);
        let nodes = nodes.ok_or_else(|| {
            EngineError::Protocol(format!(
                "bus '{bus}' of {element} terminal {terminal} is missing from the voltage export"
            ))
        })?;

        debug!("{element} terminal {terminal} is on bus {bus} with nodes {nodes:?}");
        self.terminal_nodes.insert(key, nodes.clone());
        Ok(nodes)
    }
}

impl<C: CommandChannel> PowerFlowEngine for DssTextEngine<C> {
    fn load_circuit(&mut self, master: &Path) -> EngineResult<()> {
        self.channel.run_checked(&commands::clear())?;
        self.channel.run_checked(&commands::redirect(master))?;
        self.channel
            .run_checked(&commands::snapshot_mode(self.max_control_iter))?;
        self.master = Some(master.to_path_buf());
        self.bus_nodes = None;
        self.terminal_nodes.clear();
        debug!("Compiled circuit {}", master.display());
        Ok(())
    }

    fn load_names(&mut self) -> EngineResult<Vec<String>> {
        let file = self.open_export(&commands::export_loads())?;
        commands::parse_exported_load_names(file)
    }

    fn property(&mut self, element: &ObjectName, key: &str) -> EngineResult<String> {
        let reply = self.channel.run_checked(&commands::query(element, key))?;
        Ok(reply.trim().to_string())
    }

    fn set_load_kw(&mut self, load: &str, kw: f64) -> EngineResult<()> {
        self.channel.run_checked(&commands::set_load_kw(load, kw))?;
        Ok(())
    }

    fn solve(&mut self) -> EngineResult<()> {
        self.channel.run_checked(&commands::solve())?;
        Ok(())
    }

    fn node_voltages(
        &mut self,
        element: &ObjectName,
        terminal: u32,
    ) -> EngineResult<Vec<NodeVoltage>> {
        let nodes = self.terminal_nodes(element, terminal)?;
        self.channel
            .run_checked(&commands::select(element, terminal))?;
        let command = commands::voltages();
        let reply = self.channel.run_checked(&command)?;
        let magnitudes = commands::parse_voltage_magnitudes(&command, &reply)?;
        if magnitudes.len() != nodes.len() {
            return Err(EngineError::Protocol(format!(
                "'{command}' for {element} terminal {terminal} returned {} values for nodes {nodes:?}",
                magnitudes.len()
            )));
        }
        Ok(nodes
            .into_iter()
            .zip(magnitudes)
            .map(|(node, magnitude)| NodeVoltage::new(node, magnitude))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    /// Channel that records commands and answers from a queue.
    #[derive(Default)]
    struct Scripted {
        sent: Vec<String>,
        replies: VecDeque<String>,
    }

    impl Scripted {
        fn reply(mut self, reply: &str) -> Self {
            self.replies.push_back(reply.to_string());
            self
        }
    }

    impl CommandChannel for Scripted {
        fn run(&mut self, command: &str) -> EngineResult<String> {
            self.sent.push(command.to_string());
            Ok(self.replies.pop_front().unwrap_or_default())
        }
    }

    #[test]
    fn test_load_circuit_sequence() {
        let mut engine = DssTextEngine::new(Scripted::default());
        engine.load_circuit(Path::new("/tmp/Master.dss")).unwrap();
        assert_eq!(
            engine.channel().sent,
            vec![
                "clearall",
                "redirect (/tmp/Master.dss)",
                "set mode=snapshot maxcontroliter=100",
            ]
        );
        assert_eq!(engine.master(), Some(Path::new("/tmp/Master.dss")));
    }

    #[test]
    fn test_load_names_reads_relative_export() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("ckt_EXP_LOADS.CSV"),
            "Load, kW\nLoad.a, 1\nLoad.b, 2\n",
        )
        .unwrap();
        let master = dir.path().join("Master.dss");

        let channel = Scripted::default()
            .reply("")
            .reply("")
            .reply("")
            .reply("ckt_EXP_LOADS.CSV");
        let mut engine = DssTextEngine::new(channel);
        engine.load_circuit(&master).unwrap();
        assert_eq!(engine.load_names().unwrap(), vec!["a", "b"]);
    }

    const VOLTAGE_EXPORT: &str = "Bus, BasekV, Node1, Magnitude1, Angle1, pu1, Node2, Magnitude2, Angle2, pu2, Node3, Magnitude3, Angle3, pu3\n\
        \"HV\", 12.47, 1, 7200, 0, 1, 2, 7190, -120, 1, 3, 7210, 120, 1\n\
        \"LV\", 0.208, 1, 120, 0, 1, 2, 119, -120, 1, 3, 121, 120, 1\n\
        \"LAT_BC\", 12.47, 3, 7100, 119, 1, 2, 7150, -121, 1, 0, 0, 0, 0\n";

    fn engine_with_export(dir: &Path, channel: Scripted) -> DssTextEngine<Scripted> {
        std::fs::write(dir.join("ckt_EXP_VOLTAGES.CSV"), VOLTAGE_EXPORT).unwrap();
        let mut engine = DssTextEngine::new(channel);
        engine.master = Some(dir.join("Master.dss"));
        engine
    }

    #[test]
    fn test_node_voltages_follow_bus_node_order() {
        let dir = tempdir().unwrap();
        let channel = Scripted::default()
            .reply("lat_bc.2")
            .reply("ckt_EXP_VOLTAGES.CSV")
            .reply("")
            .reply("7100.5, 119.0, 7150.5, -121.0")
            .reply("")
            .reply("7101.0, 119.0, 7151.0, -121.0");
        let mut engine = engine_with_export(dir.path(), channel);
        let load = ObjectName::load("l1");

        let first = engine.node_voltages(&load, 1).unwrap();
        assert_eq!(
            first,
            vec![NodeVoltage::new(3, 7100.5), NodeVoltage::new(2, 7150.5)]
        );
        let second = engine.node_voltages(&load, 1).unwrap();
        assert_eq!(second[1], NodeVoltage::new(2, 7151.0));

        // Bus nodes are looked up once per circuit
        assert_eq!(
            engine.channel().sent,
            vec![
                "? load.l1.bus1",
                "export voltages",
                "select load.l1 1",
                "voltages",
                "select load.l1 1",
                "voltages",
            ]
        );
    }

    #[test]
    fn test_transformer_winding_uses_its_bus() {
        let dir = tempdir().unwrap();
        let channel = Scripted::default()
            .reply("[HV.1.2.3, LV.1.2.3, ]")
            .reply("ckt_EXP_VOLTAGES.CSV")
            .reply("")
            .reply("120.0, 0.0, 119.0, -120.0, 121.0, 120.0");
        let mut engine = engine_with_export(dir.path(), channel);

        let readings = engine
            .node_voltages(&ObjectName::transformer("t1"), 2)
            .unwrap();
        assert_eq!(
            readings.iter().map(|r| r.node).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(engine.channel().sent[0], "? transformer.t1.buses");
        assert_eq!(engine.channel().sent[2], "select transformer.t1 2");
    }

    #[test]
    fn test_reading_count_must_match_bus_nodes() {
        let dir = tempdir().unwrap();
        let channel = Scripted::default()
            .reply("lat_bc.2")
            .reply("ckt_EXP_VOLTAGES.CSV")
            .reply("")
            .reply("7100.5, 119.0");
        let mut engine = engine_with_export(dir.path(), channel);
        let err = engine.node_voltages(&ObjectName::load("l1"), 1).unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
    }

    #[test]
    fn test_unknown_bus_is_reported() {
        let dir = tempdir().unwrap();
        let channel = Scripted::default()
            .reply("nowhere.1")
            .reply("ckt_EXP_VOLTAGES.CSV");
        let mut engine = engine_with_export(dir.path(), channel);
        let err = engine.node_voltages(&ObjectName::load("l1"), 1).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_export_path_with_error_words() {
        let dir = tempdir().unwrap();
        let errors = dir.path().join("errors").join("not found");
        std::fs::create_dir_all(&errors).unwrap();
        let export = errors.join("ckt_EXP_LOADS.CSV");
        std::fs::write(&export, "Load, kW\nLoad.a, 1\n").unwrap();

        let channel = Scripted::default().reply(export.to_str().unwrap());
        let mut engine = DssTextEngine::new(channel);
        assert_eq!(engine.load_names().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_missing_export_file_is_a_command_error() {
        let dir = tempdir().unwrap();
        let channel = Scripted::default().reply("Error 256: cannot write export");
        let mut engine = DssTextEngine::new(channel);
        engine.master = Some(dir.path().join("Master.dss"));
        let err = engine.load_names().unwrap_err();
        assert!(matches!(err, EngineError::Command { ref command, .. } if command == "export loads"));
    }

    #[test]
    fn test_solve_failure_is_reported() {
        let channel = Scripted::default().reply("Solution did not converge.");
        let mut engine = DssTextEngine::new(channel);
        let err = engine.solve().unwrap_err();
        assert!(matches!(err, EngineError::Command { ref command, .. } if command == "solve"));
    }

    #[test]
    fn test_numeric_property() {
        let channel = Scripted::default().reply(" 7.2 ").reply("wye");
        let mut engine = DssTextEngine::new(channel);
        let load = ObjectName::load("l1");
        assert_eq!(engine.numeric_property(&load, "kV").unwrap(), 7.2);
        assert!(engine.numeric_property(&load, "conn").is_err());
    }
}
