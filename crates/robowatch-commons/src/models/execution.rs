use std::collections::HashMap;

use serde::{
    Deserialize,
    Serialize,
};

/// Status code marking a row in the business-records database as pending.
pub const PENDING_STATUS: i64 = 4;

/// One pending row from `bwav4.execucao`, read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingExecution {
    pub id: i64,
    #[serde(rename = "nome_do_robo")]
    pub robot_name: String,
    #[serde(rename = "status_01")]
    pub status: i64,
}

/// Executions grouped by the robot name the external database reports.
pub type ExecutionsMap = HashMap<String, Vec<PendingExecution>>;

/// Looks a robot up in the executions snapshot: exact name first, then the
/// separator-insensitive fold.
pub fn executions_for_robot<'a>(
    name: &str, executions: &'a ExecutionsMap,
) -> Option<&'a Vec<PendingExecution>> {
    if let Some(rows) = executions.get(name) {
        return Some(rows);
    }
    let wanted = crate::naming::normalize(name);
    executions
        .iter()
        .find(|(db_name, _)| crate::naming::normalize(db_name) == wanted)
        .map(|(_, rows)| rows)
}

/// Pending count for a robot, tolerant matching included.
pub fn pending_count(name: &str, executions: &ExecutionsMap) -> usize {
    executions_for_robot(name, executions).map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, count: usize) -> ExecutionsMap {
        let mut map = ExecutionsMap::new();
        map.insert(
            name.to_string(),
            (0..count)
                .map(|i| PendingExecution {
                    id: i as i64,
                    robot_name: name.to_string(),
                    status: PENDING_STATUS,
                })
                .collect(),
        );
        map
    }

    #[test]
    fn test_exact_match_wins() {
        let map = sample("att_infos_bitrix", 3);
        assert_eq!(pending_count("att_infos_bitrix", &map), 3);
    }

    #[test]
    fn test_normalized_match() {
        let map = sample("att_infos_bitrix", 2);
        assert_eq!(pending_count("att-infos-bitrix", &map), 2);
        assert_eq!(pending_count("AttInfosBitrix", &map), 2);
    }

    #[test]
    fn test_no_match() {
        let map = sample("att_infos_bitrix", 2);
        assert_eq!(pending_count("other_bot", &map), 0);
        assert_eq!(pending_count("other_bot", &ExecutionsMap::new()), 0);
    }
}
