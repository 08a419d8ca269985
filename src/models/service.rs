/// Duration and calendar color a service resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub duration_minutes: i64,
    pub color_id: String,
}

/// One catalog entry: matches when the service name contains every keyword.
#[derive(Debug, Clone)]
pub struct ServiceRule {
    pub keywords: Vec<String>,
    pub spec: ServiceSpec,
}

impl ServiceRule {
    pub fn new(keywords: &[&str], duration_minutes: i64, color_id: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            spec: ServiceSpec {
                duration_minutes,
                color_id: color_id.to_string(),
            },
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.keywords.iter().all(|k| name.contains(k.as_str()))
    }
}

/// Ordered keyword table resolving free-text service names. Rules are tried
/// in order, so combined services must precede their parts.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    rules: Vec<ServiceRule>,
    fallback: ServiceSpec,
}

impl ServiceCatalog {
    pub fn new(rules: Vec<ServiceRule>, fallback: ServiceSpec) -> Self {
        Self { rules, fallback }
    }

    pub fn resolve(&self, service: &str) -> ServiceSpec {
        let name = service.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&name))
            .map(|rule| rule.spec.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::new(
            vec![
                ServiceRule::new(&["haircut", "beard"], 60, "6"),
                ServiceRule::new(&["haircut"], 45, "9"),
                ServiceRule::new(&["beard"], 30, "10"),
                ServiceRule::new(&["shave"], 30, "7"),
                ServiceRule::new(&["enhancement", "temporary"], 15, "4"),
                ServiceRule::new(&["enhancement"], 45, "4"),
            ],
            ServiceSpec {
                duration_minutes: 60,
                color_id: "1".to_string(),
            },
        )
    }
}
