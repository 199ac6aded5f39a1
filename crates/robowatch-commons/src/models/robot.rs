use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

/// The three robot variants the catalog knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotKind {
    Rpa,
    Cronjob,
    Deployment,
}

impl RobotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotKind::Rpa => "rpa",
            RobotKind::Cronjob => "cronjob",
            RobotKind::Deployment => "deployment",
        }
    }

    /// Tag injected into every robot of this variant.
    pub fn auto_tag(&self) -> &'static str {
        match self {
            RobotKind::Rpa => "Exec",
            RobotKind::Cronjob => "Agendado",
            RobotKind::Deployment => "24/7",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rpa" => Some(RobotKind::Rpa),
            "cronjob" => Some(RobotKind::Cronjob),
            "deployment" => Some(RobotKind::Deployment),
            _ => None,
        }
    }
}

impl std::fmt::Display for RobotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified catalog record. Variant-specific fields are optional and only
/// meaningful for the matching `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "tipo")]
    pub kind: RobotKind,
    #[serde(default)]
    #[serde(rename = "apelido")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_repository")]
    pub image_repository: String,
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    #[serde(default = "default_memory_limit")]
    pub memory_limit_mb: u64,
    #[serde(default = "default_namespace")]
    pub namespace: String,

    // rpa
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_files: Option<bool>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime_seconds: Option<u64>,

    // cronjob
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<u64>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on_executions: Option<bool>,

    // deployment
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<u32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_repository() -> String {
    "rpaglobal".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_memory_limit() -> u64 {
    256
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Robot {
    pub fn new(name: impl Into<String>, kind: RobotKind) -> Self {
        Robot {
            id: None,
            name: name.into(),
            kind,
            alias: None,
            tags: Vec::new(),
            active: true,
            created_at: None,
            updated_at: None,
            deactivated_at: None,
            image_repository: default_repository(),
            image_tag: default_image_tag(),
            memory_limit_mb: default_memory_limit(),
            namespace: default_namespace(),
            max_instances: None,
            external_files: None,
            lifetime_seconds: None,
            schedule: None,
            timezone: None,
            suspended: None,
            ttl_seconds_after_finished: None,
            depends_on_executions: None,
            replicas: None,
            ready_replicas: None,
            available_replicas: None,
        }
    }

    /// Full image reference used in generated manifests.
    pub fn image(&self) -> String {
        format!(
            "{}/{}:{}",
            self.image_repository,
            self.name.to_lowercase(),
            self.image_tag
        )
    }

    /// Normalizes the record before it is persisted: trims the alias,
    /// injects the variant auto-tag and fills variant defaults.
    pub fn prepare(mut self) -> Self {
        if let Some(ref mut alias) = self.alias {
            *alias = alias.trim().to_string();
            if alias.is_empty() {
                self.alias = None;
            }
        }

        let auto_tag = self.kind.auto_tag();
        if !self.tags.iter().any(|t| t == auto_tag) {
            self.tags.push(auto_tag.to_string());
        }

        match self.kind {
            RobotKind::Rpa => {
                if self.max_instances.is_none() {
                    self.max_instances = Some(1);
                }
                if self.external_files.is_none() {
                    self.external_files = Some(false);
                }
                if self.lifetime_seconds.is_none() {
                    self.lifetime_seconds = Some(600);
                }
            }
            RobotKind::Cronjob => {
                if self.timezone.is_none() {
                    self.timezone = Some("America/Sao_Paulo".to_string());
                }
                if self.suspended.is_none() {
                    self.suspended = Some(false);
                }
                if self.ttl_seconds_after_finished.is_none() {
                    self.ttl_seconds_after_finished = Some(60);
                }
                if self.depends_on_executions.is_none() {
                    self.depends_on_executions = Some(true);
                }
            }
            RobotKind::Deployment => {
                if self.replicas.is_none() {
                    self.replicas = Some(1);
                }
                if self.depends_on_executions.is_none() {
                    self.depends_on_executions = Some(true);
                }
            }
        }

        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Robot name cannot be empty".to_string());
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!(
                "Robot name '{}' may only contain letters, digits, '-' and '_'",
                self.name
            ));
        }
        match self.kind {
            RobotKind::Rpa => {
                if self.max_instances.map_or(true, |n| n < 1) {
                    return Err("max_instances must be at least 1".to_string());
                }
            }
            RobotKind::Cronjob => {
                if self.schedule.as_deref().map_or(true, str::is_empty) {
                    return Err("Cronjob requires a schedule".to_string());
                }
            }
            RobotKind::Deployment => {}
        }
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.deactivated_at = Some(now);
        self.updated_at = Some(now);
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.active = true;
        self.deactivated_at = None;
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_injects_auto_tag() {
        let rpa = Robot::new("att_infos_bitrix", RobotKind::Rpa).prepare();
        assert!(rpa.tags.contains(&"Exec".to_string()));

        let cronjob = Robot::new("daily-export", RobotKind::Cronjob).prepare();
        assert!(cronjob.tags.contains(&"Agendado".to_string()));

        let deployment = Robot::new("api-proxy", RobotKind::Deployment).prepare();
        assert!(deployment.tags.contains(&"24/7".to_string()));
    }

    #[test]
    fn test_prepare_does_not_duplicate_auto_tag() {
        let mut robot = Robot::new("bot", RobotKind::Rpa);
        robot.tags = vec!["Exec".to_string(), "finance".to_string()];
        let prepared = robot.prepare();
        assert_eq!(
            prepared.tags.iter().filter(|t| *t == "Exec").count(),
            1
        );
    }

    #[test]
    fn test_prepare_trims_alias() {
        let mut robot = Robot::new("bot", RobotKind::Rpa);
        robot.alias = Some("  Painel  ".to_string());
        let prepared = robot.prepare();
        assert_eq!(prepared.alias, Some("Painel".to_string()));

        let mut blank = Robot::new("bot", RobotKind::Rpa);
        blank.alias = Some("   ".to_string());
        assert_eq!(blank.prepare().alias, None);
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let robot = Robot::new("has space", RobotKind::Rpa).prepare();
        assert!(robot.validate().is_err());

        let robot = Robot::new("", RobotKind::Rpa).prepare();
        assert!(robot.validate().is_err());

        let robot = Robot::new("att_infos_bitrix", RobotKind::Rpa).prepare();
        assert!(robot.validate().is_ok());
    }

    #[test]
    fn test_validate_rpa_instances() {
        let mut robot = Robot::new("bot", RobotKind::Rpa);
        robot.max_instances = Some(0);
        assert!(robot.validate().is_err());

        let prepared = Robot::new("bot", RobotKind::Rpa).prepare();
        assert_eq!(prepared.max_instances, Some(1));
        assert!(prepared.validate().is_ok());
    }

    #[test]
    fn test_deactivate_stamps_timestamp() {
        let mut robot = Robot::new("bot", RobotKind::Rpa).prepare();
        let now = Utc::now();
        robot.deactivate(now);
        assert!(!robot.active);
        assert_eq!(robot.deactivated_at, Some(now));

        robot.activate(now);
        assert!(robot.active);
        assert_eq!(robot.deactivated_at, None);
    }

    #[test]
    fn test_image_reference() {
        let mut robot = Robot::new("Att_Infos_Bitrix", RobotKind::Rpa);
        robot.image_tag = "v1.2".to_string();
        assert_eq!(robot.image(), "rpaglobal/att_infos_bitrix:v1.2");
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [RobotKind::Rpa, RobotKind::Cronjob, RobotKind::Deployment] {
            assert_eq!(RobotKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RobotKind::parse("job"), None);
    }
}
