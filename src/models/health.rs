use rocket::serde::Serialize;
use schemars::JsonSchema;

#[derive(Serialize, Debug, JsonSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

impl HealthResponse {
    pub fn from_database(reachable: bool) -> Self {
        if reachable {
            Self { status: "ok", database: "up" }
        } else {
            Self {
                status: "degraded",
                database: "down",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_database_degrades_health() {
        let health = HealthResponse::from_database(false);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.database, "down");
        assert_eq!(HealthResponse::from_database(true).status, "ok");
    }
}
