use std::io::Write;
use std::process::{Command, Stdio};

use mapify::classify::{classify, BinningMode};
use mapify::filter::{FilterMode, FilterOutcome};
use mapify::legend::{LegendOptions, LegendSection};
use mapify::model::{Coordinate, Feature, FeatureCollection, Header, LayerKind, PropertyValue, SymbolType};
use mapify::options::{ColorUpdate, SymbolUpdate};
use mapify::scale::symbol_size;
use mapify::session::MapState;
use serde_json::Value;
use std::collections::BTreeMap;

/// Helper function to run mapify with arguments and optional stdin
fn run_mapify(args: &[&str], stdin: Option<&str>) -> Result<Value, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mapify"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if let Some(mut handle) = child.stdin.take() {
        if let Some(content) = stdin {
            handle
                .write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write to stdin: {}", e))?;
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        serde_json::from_slice(&output.stdout).map_err(|e| format!("Output is not JSON: {}", e))
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn features(field: &str, values: &[f64]) -> FeatureCollection {
    FeatureCollection::new(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let mut props = BTreeMap::new();
                props.insert(field.to_string(), PropertyValue::Number(v));
                Feature::new(Coordinate { lon: 20.0 + i as f64, lat: 60.0 }, props)
            })
            .collect(),
    )
}

// Library scenarios

#[test]
fn test_equidistant_classification_scenario() {
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let limits = classify(&values, BinningMode::Equidistant, 5).unwrap();
    let expected = [1.0, 2.8, 4.6, 6.4, 8.2, 10.0];
    assert_eq!(limits.len(), expected.len());
    for (a, e) in limits.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{:?}", limits);
    }

    let mut state = MapState::new();
    let id = state
        .add_layer("a", LayerKind::Choropleth, features("v", &values), vec![Header::number("v")])
        .unwrap();
    state
        .update_color(
            id,
            &ColorUpdate {
                mode: Some(BinningMode::Equidistant),
                class_count: Some(5),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(state.layer(id).unwrap().config().color().colors().len(), 5);
}

#[test]
fn test_symbol_size_scenario() {
    let size = symbol_size(100.0, 1.0, 5.0, 30.0);
    assert!((size - 11.28).abs() < 0.01, "got {}", size);
}

#[test]
fn test_filter_scenario() {
    let mut state = MapState::new();
    let id = state
        .add_layer(
            "c",
            LayerKind::Symbol(SymbolType::Circle),
            features("v", &[10.0, 20.0, 30.0, 20.0, 10.0]),
            vec![Header::number("v")],
        )
        .unwrap();
    let filter = state.create_filter(id, "Values", "v", FilterMode::Remove).unwrap();
    assert_eq!(
        state.filter(filter).unwrap().table().bucket(20.0).unwrap().refs,
        vec![1, 3]
    );

    let outcome = state.apply_filter(filter, 15.0, 25.0).unwrap();
    assert_eq!(
        outcome,
        FilterOutcome::Objects {
            shown: vec![1, 3],
            hidden: vec![0, 2, 4],
            mode: FilterMode::Remove,
        }
    );
}

#[test]
fn test_legend_percentage_scenario() {
    let values = [1.0, 1.5, 2.0, 2.5, 7.0, 8.0, 9.0, 9.5, 10.0, 10.0];
    let mut state = MapState::new();
    let id = state
        .add_layer("d", LayerKind::Choropleth, features("v", &values), vec![Header::number("v")])
        .unwrap();
    state
        .update_color(
            id,
            &ColorUpdate {
                mode: Some(BinningMode::Custom),
                custom_boundaries: Some(vec![0.0, 3.0, 6.0, 10.0]),
                ..Default::default()
            },
        )
        .unwrap();
    state.set_legend_options(LegendOptions {
        show_percentages: true,
        ..Default::default()
    });

    let legend = state.legend();
    match &legend.layers[0].sections[..] {
        [LegendSection::Choropleth(classes)] => {
            let percentages: Vec<Option<f64>> = classes.swatches.iter().map(|s| s.percentage).collect();
            assert_eq!(percentages, vec![Some(40.0), Some(0.0), Some(60.0)]);
        }
        other => panic!("Unexpected sections {:?}", other),
    }
}

#[test]
fn test_rejected_update_keeps_map_consistent() {
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut state = MapState::new();
    let id = state
        .add_layer("e", LayerKind::Symbol(SymbolType::Circle), features("v", &values), vec![Header::number("v")])
        .unwrap();
    let before = serde_json::to_string(&state.legend()).unwrap();

    let err = state
        .update_symbol(
            id,
            &SymbolUpdate {
                size_field: Some("v".into()),
                size_multiplier: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("size multiplier"));
    assert_eq!(serde_json::to_string(&state.legend()).unwrap(), before);
}

// Binary end to end

#[test]
fn test_end_to_end_styles() {
    let result = run_mapify(&["styles", "--config", "test/map.toml"], None);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json["kind"], "features");
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["mark"]["type"], "circle");
    assert_eq!(items[9]["mark"]["radius"], 30.0);
    assert_eq!(items[9]["class_index"], 4);
    assert_eq!(items[9]["fill_color"], "#67000d");
}

#[test]
fn test_end_to_end_legend() {
    let result = run_mapify(&["legend", "--config", "test/map.toml"], None);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json["title"], "Population");
    let sections = json["layers"][0]["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["type"], "choropleth");
    assert_eq!(sections[0]["swatches"].as_array().unwrap().len(), 5);
    assert_eq!(sections[0]["swatches"][0]["percentage"], 20.0);
    assert_eq!(sections[1]["type"], "scaled_size");
    assert_eq!(sections[1]["tracks"][0]["exemplars"].as_array().unwrap().len(), 5);
}

#[test]
fn test_end_to_end_filter() {
    let result = run_mapify(&["filter", "--config", "test/map.toml"], None);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json[0]["type"], "objects");
    let shown: Vec<u64> = json[0]["shown"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_u64())
        .collect();
    assert_eq!(shown, vec![2, 3, 4, 5]);
}

#[test]
fn test_end_to_end_heat_filter_step() {
    let result = run_mapify(&["filter", "--config", "test/heat.toml"], None);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json[0]["type"], "heat");
    let points = json[0]["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1]["intensity"], 1.0);
}

#[test]
fn test_end_to_end_save_bundle() {
    let result = run_mapify(&["save", "--config", "test/map.toml"], None);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json["layers"].as_array().unwrap().len(), 1);
    assert_eq!(json["filters"].as_array().unwrap().len(), 1);
    assert_eq!(json["legend"]["title"], "Population");

    let restored = MapState::load_json(&json.to_string()).unwrap();
    assert_eq!(restored.layers()[0].config().color().colors().len(), 5);
}

#[test]
fn test_end_to_end_csv_from_stdin() {
    let dir = std::env::temp_dir().join("mapify-stdin-test");
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("map.toml");
    std::fs::write(&config, "[layer]\nkind = \"choropleth\"\n").unwrap();

    let csv = "lat,lon,a,b\n60,20,1,5\n61,21,2,6\n62,22,3,9\n";
    let result = run_mapify(&["styles", "--config", config.to_str().unwrap()], Some(csv));
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let items = result.unwrap()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["mark"]["type"], "area");
}

#[test]
fn test_end_to_end_invalid_class_count() {
    let dir = std::env::temp_dir().join("mapify-invalid-test");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy("test/points.csv", dir.join("points.csv")).unwrap();
    let config = dir.join("map.toml");
    std::fs::write(
        &config,
        "[input]\ncsv = \"points.csv\"\n\n[color]\nchoropleth_field = \"pop\"\nclass_count = 12\n",
    )
    .unwrap();

    let result = run_mapify(&["legend", "--config", config.to_str().unwrap()], None);
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("steps must be between 2 and 10"));
}

#[test]
fn test_end_to_end_missing_config() {
    let result = run_mapify(&["legend", "--config", "test/does-not-exist.toml"], None);
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Failed to read config file"));
}

#[test]
fn test_end_to_end_schemes() {
    let result = run_mapify(&["schemes"], None);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let names = result.unwrap();
    assert_eq!(names.as_array().unwrap().len(), 10);
    assert_eq!(names[0], "Greys");
}
