use serde::{Deserialize, Deserializer, Serialize};

use crate::registry::Registry;

/// the `Item` object of an upstream getSensorData response.
/// values arrive as strings; numbers are accepted and stringified.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorItem {
    /// relative humidity (%)
    #[serde(default, deserialize_with = "lenient_string")]
    pub hy: String,
    /// co2 concentration (ppm)
    #[serde(default, deserialize_with = "lenient_string")]
    pub co2: String,
    /// temperature in fahrenheit
    #[serde(default, deserialize_with = "lenient_string")]
    pub tp: String,
    /// "1" when the light is on
    #[serde(default, deserialize_with = "lenient_string")]
    pub light_status: String,
    /// vapor pressure deficit
    #[serde(default, deserialize_with = "lenient_string")]
    pub vpd: String,
    /// controller-local time of the reading
    #[serde(default, deserialize_with = "lenient_string")]
    pub ct_tm: String,
    /// light state as reported by the controller
    #[serde(default, deserialize_with = "lenient_string")]
    pub lp: String,
    /// day/night flag
    #[serde(default, deserialize_with = "lenient_string")]
    pub d_n: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mac: String,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// outcome of one fetch for one controller
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    Data { item: SensorItem },
    /// upstream answered but carried no `Item`
    NoData,
    Error { message: String },
}

impl Reading {
    pub fn error(message: impl Into<String>) -> Self {
        Reading::Error { message: message.into() }
    }

    pub fn item(&self) -> Option<&SensorItem> {
        match self {
            Reading::Data { item } => Some(item),
            _ => None,
        }
    }
}

/// the three user-visible states plus "no data", derived strictly from
/// `is_loading` and the reading variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Loading,
    Error,
    NoData,
    Data,
}

/// presentation-ready values of a data reading
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReadingView {
    /// celsius, one decimal; None when `tp` is not a number
    pub temperature_c: Option<f64>,
    pub humidity: String,
    pub co2: String,
    pub light: &'static str,
    pub vpd: String,
    pub time: String,
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

impl ReadingView {
    pub fn from_item(item: &SensorItem) -> Self {
        let temperature_c = item
            .tp
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| (fahrenheit_to_celsius(f) * 10.0).round() / 10.0);

        Self {
            temperature_c,
            humidity: format!("{}%", item.hy),
            co2: format!("{} ppm", item.co2),
            light: if item.light_status == "1" { "On" } else { "Off" },
            vpd: item.vpd.clone(),
            time: item.ct_tm.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub name: String,
    pub mac: String,
    pub reading: Reading,
    pub is_loading: bool,
}

impl ControllerSnapshot {
    pub fn state(&self) -> ControllerState {
        if self.is_loading {
            return ControllerState::Loading;
        }
        match self.reading {
            Reading::Data { .. } => ControllerState::Data,
            Reading::NoData => ControllerState::NoData,
            Reading::Error { .. } => ControllerState::Error,
        }
    }

    pub fn view(&self) -> Option<ReadingView> {
        match self.state() {
            ControllerState::Data => self.reading.item().map(ReadingView::from_item),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSnapshot {
    pub name: String,
    pub controllers: Vec<ControllerSnapshot>,
}

/// result of one aggregation cycle, replaced as a whole
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub groups: Vec<GroupSnapshot>,
    /// number of completed aggregation cycles
    pub cycle: u64,
    /// unix timestamp (ms) of the cycle that produced this snapshot
    pub refreshed_at_ms: Option<u64>,
    /// true only while the initial aggregation is in flight
    pub initial_loading: bool,
}

impl DashboardSnapshot {
    /// every registry controller in the loading state; the value readers
    /// see before the first cycle lands
    pub fn placeholder(registry: &Registry) -> Self {
        let groups = registry
            .groups()
            .iter()
            .map(|group| GroupSnapshot {
                name: group.name.clone(),
                controllers: group
                    .controllers
                    .iter()
                    .map(|c| ControllerSnapshot {
                        name: c.name.clone(),
                        mac: c.mac.clone(),
                        reading: Reading::NoData,
                        is_loading: true,
                    })
                    .collect(),
            })
            .collect();

        Self { groups, cycle: 0, refreshed_at_ms: None, initial_loading: true }
    }

    pub fn controllers(&self) -> impl Iterator<Item = (&str, &ControllerSnapshot)> {
        self.groups
            .iter()
            .flat_map(|g| g.controllers.iter().map(move |c| (g.name.as_str(), c)))
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> SensorItem {
        serde_json::from_value(json!({
            "hy": "55", "co2": "800", "tp": "70",
            "light_status": "1", "vpd": "1.2", "ct_tm": "12:00"
        }))
        .unwrap()
    }

    #[test]
    fn converts_reading_for_display() {
        let view = ReadingView::from_item(&item());
        assert_eq!(view.temperature_c, Some(21.1));
        assert_eq!(view.humidity, "55%");
        assert_eq!(view.co2, "800 ppm");
        assert_eq!(view.light, "On");
        assert_eq!(view.vpd, "1.2");
        assert_eq!(view.time, "12:00");
    }

    #[test]
    fn light_is_off_unless_one() {
        let mut item = item();
        item.light_status = "0".into();
        assert_eq!(ReadingView::from_item(&item).light, "Off");
        item.light_status = String::new();
        assert_eq!(ReadingView::from_item(&item).light, "Off");
    }

    #[test]
    fn bad_temperature_yields_none() {
        let mut item = item();
        item.tp = "--".into();
        assert_eq!(ReadingView::from_item(&item).temperature_c, None);
    }

    #[test]
    fn accepts_numeric_fields() {
        let item: SensorItem =
            serde_json::from_value(json!({ "tp": 70, "hy": 55.5, "timestamp": 1700000000 })).unwrap();
        assert_eq!(item.tp, "70");
        assert_eq!(item.hy, "55.5");
        assert_eq!(item.co2, "");
        assert_eq!(item.timestamp, Some(json!(1700000000)));
    }

    #[test]
    fn state_follows_variant() {
        let mut snap = ControllerSnapshot {
            name: "Ctrl1".into(),
            mac: "AA".into(),
            reading: Reading::Data { item: item() },
            is_loading: false,
        };
        assert_eq!(snap.state(), ControllerState::Data);
        assert!(snap.view().is_some());

        snap.reading = Reading::NoData;
        assert_eq!(snap.state(), ControllerState::NoData);
        assert!(snap.view().is_none());

        snap.reading = Reading::error("timeout");
        assert_eq!(snap.state(), ControllerState::Error);

        snap.is_loading = true;
        assert_eq!(snap.state(), ControllerState::Loading);
    }

    #[test]
    fn reading_serializes_tagged() {
        let value = serde_json::to_value(Reading::error("boom")).unwrap();
        assert_eq!(value, json!({ "kind": "error", "message": "boom" }));
        let value = serde_json::to_value(Reading::NoData).unwrap();
        assert_eq!(value, json!({ "kind": "no_data" }));
    }
}
