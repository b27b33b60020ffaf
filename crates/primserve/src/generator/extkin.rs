use super::WorkGenerator;
use primserve_core::{Error, Result, protocol::Primary};
use rand::rngs::StdRng;
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

/// Replays events from a kinematics file.
///
/// The file holds one event per line, each a JSON array of primaries.
/// Blank lines are skipped. The file is read on [`WorkGenerator::init`],
/// and generation fails once every event has been replayed.
#[derive(Debug, Clone)]
pub struct ExtKinematics {
    path: PathBuf,
    events: VecDeque<Vec<Primary>>,
}

impl ExtKinematics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            events: VecDeque::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events left to replay.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl WorkGenerator for ExtKinematics {
    fn init(&mut self) -> Result<()> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| Error::Generation {
            reason: format!("cannot read kinematics file {}: {e}", self.path.display()),
        })?;

        self.events = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| Error::Generation {
                    reason: format!("{}:{}: {e}", self.path.display(), n + 1),
                })
            })
            .collect::<Result<_>>()?;

        tracing::info!(
            "Loaded {} events from {}",
            self.events.len(),
            self.path.display()
        );
        Ok(())
    }

    fn generate(&mut self, _rng: &mut StdRng) -> Result<Vec<Primary>> {
        self.events.pop_front().ok_or_else(|| Error::Generation {
            reason: format!("kinematics file {} is exhausted", self.path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn write_kinematics(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "primserve-extkin-{name}-{}.jsonl",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn replays_events_in_file_order() {
        let path = write_kinematics(
            "order",
            "[{\"pdg\":13,\"px\":1.0,\"py\":0.0,\"pz\":0.0,\"e\":1.1,\"vx\":0.0,\"vy\":0.0,\"vz\":0.0,\"t\":0.0}]\n\
             \n\
             []\n",
        );
        let mut generator = ExtKinematics::new(&path);
        generator.init().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(generator.remaining(), 2);

        let mut rng = StdRng::seed_from_u64(0);
        let first = generator.generate(&mut rng).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].pdg, 13);
        assert!(generator.generate(&mut rng).unwrap().is_empty());
        assert!(matches!(
            generator.generate(&mut rng),
            Err(Error::Generation { .. })
        ));
    }

    #[test]
    fn bad_lines_fail_initialization() {
        let path = write_kinematics("bad", "[]\nnot json\n");
        let mut generator = ExtKinematics::new(&path);
        let err = generator.init().unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains(":2:"));

        let mut missing = ExtKinematics::new("/definitely/not/here.jsonl");
        assert!(missing.init().is_err());
    }
}
