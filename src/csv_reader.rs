use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

use crate::model::{Coordinate, Feature, FeatureCollection, Header, PropertyValue};

const LAT_NAMES: &[&str] = &["lat", "latitude"];
const LON_NAMES: &[&str] = &["lon", "lng", "long", "longitude"];

#[derive(Debug, Clone)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

/// Point dataset ready to become a layer
#[derive(Debug, Clone)]
pub struct PointData {
    pub features: FeatureCollection,
    pub headers: Vec<Header>,
}

pub fn read_csv<R: Read>(input: R) -> Result<CsvData> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read CSV record")?;
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(anyhow!("CSV must contain at least one data row"));
    }

    Ok(CsvData { headers, rows })
}

pub fn read_csv_from_stdin() -> Result<CsvData> {
    read_csv(io::stdin())
}

pub fn read_csv_file(path: &Path) -> Result<CsvData> {
    let file = File::open(path).with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    read_csv(file)
}

pub fn parse_column_selector(input: &str) -> ColumnSelector {
    match input.parse::<usize>() {
        Ok(index) => ColumnSelector::Index(index),
        Err(_) => ColumnSelector::Name(input.to_string()),
    }
}

pub fn find_column(data: &CsvData, selector: &ColumnSelector) -> Result<usize> {
    match selector {
        ColumnSelector::Index(idx) => {
            if *idx >= data.headers.len() {
                return Err(anyhow!(
                    "Column index {} out of bounds (available columns: {})",
                    idx,
                    data.headers.len()
                ));
            }
            Ok(*idx)
        }
        ColumnSelector::Name(name) => data
            .headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                anyhow!(
                    "Column '{}' not found. Available columns: {}",
                    name,
                    data.headers.join(", ")
                )
            }),
    }
}

/// Column holding one coordinate axis: the explicit selector, or the first
/// header matching one of `names` (case-insensitive).
fn coordinate_column(data: &CsvData, selector: Option<&str>, names: &[&str], axis: &str) -> Result<usize> {
    if let Some(selector) = selector {
        return find_column(data, &parse_column_selector(selector));
    }
    data.headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        .ok_or_else(|| {
            anyhow!(
                "No {} column found (tried {}). Available columns: {}",
                axis,
                names.join(", "),
                data.headers.join(", ")
            )
        })
}

/// A column is numeric when every non-empty cell parses and at least one does.
pub fn infer_headers(data: &CsvData, skip: &[usize]) -> Vec<Header> {
    data.headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !skip.contains(i))
        .map(|(i, name)| {
            let mut cells = data
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .peekable();
            let numeric = cells.peek().is_some() && cells.all(|c| c.parse::<f64>().is_ok());
            if numeric {
                Header::number(name)
            } else {
                Header::text(name)
            }
        })
        .collect()
}

/// Turn rows into point features. Coordinate columns become geometry, the
/// rest become properties typed by their header.
pub fn to_point_data(data: &CsvData, lat: Option<&str>, lon: Option<&str>) -> Result<PointData> {
    let lat_idx = coordinate_column(data, lat, LAT_NAMES, "latitude")?;
    let lon_idx = coordinate_column(data, lon, LON_NAMES, "longitude")?;
    let headers = infer_headers(data, &[lat_idx, lon_idx]);

    let mut features = Vec::with_capacity(data.rows.len());
    for (row_idx, row) in data.rows.iter().enumerate() {
        let coordinate = |idx: usize| -> Result<f64> {
            let cell = row.get(idx).map(|c| c.trim()).unwrap_or("");
            cell.parse::<f64>().with_context(|| {
                format!(
                    "Failed to parse coordinate '{}' in column '{}' at row {}",
                    cell,
                    data.headers[idx],
                    row_idx + 1
                )
            })
        };
        let geometry = Coordinate {
            lat: coordinate(lat_idx)?,
            lon: coordinate(lon_idx)?,
        };

        let mut properties = BTreeMap::new();
        for header in &headers {
            let Some(col) = data.headers.iter().position(|h| *h == header.name) else {
                continue;
            };
            let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
            if cell.is_empty() {
                trace!(row = row_idx + 1, column = %header.name, "empty cell skipped");
                continue;
            }
            properties.insert(header.name.clone(), PropertyValue::parse(cell));
        }
        features.push(Feature::new(geometry, properties));
    }

    Ok(PointData {
        features: FeatureCollection::new(features),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HeaderKind;
    use std::io::Cursor;

    /// Helper function to create CsvData from string
    fn csv_from_string(content: &str) -> Result<CsvData> {
        read_csv(Cursor::new(content))
    }

    #[test]
    fn test_parse_column_selector_by_index() {
        match parse_column_selector("0") {
            ColumnSelector::Index(i) => assert_eq!(i, 0),
            _ => panic!("Expected Index"),
        }
        match parse_column_selector("42") {
            ColumnSelector::Index(i) => assert_eq!(i, 42),
            _ => panic!("Expected Index"),
        }
    }

    #[test]
    fn test_parse_column_selector_by_name() {
        match parse_column_selector("latitude") {
            ColumnSelector::Name(s) => assert_eq!(s, "latitude"),
            _ => panic!("Expected Name"),
        }
    }

    #[test]
    fn test_find_column_case_insensitive() {
        let csv = csv_from_string("Lat,Lon,pop\n1,2,3").unwrap();
        assert_eq!(find_column(&csv, &ColumnSelector::Name("lat".into())).unwrap(), 0);
        assert_eq!(find_column(&csv, &ColumnSelector::Index(2)).unwrap(), 2);
    }

    #[test]
    fn test_find_column_errors() {
        let csv = csv_from_string("x,y\n1,10").unwrap();
        let result = find_column(&csv, &ColumnSelector::Name("nonexistent".into()));
        assert!(result.unwrap_err().to_string().contains("not found"));
        let result = find_column(&csv, &ColumnSelector::Index(99));
        assert!(result.unwrap_err().to_string().contains("out of bounds"));
    }

    #[test]
    fn test_read_csv_basic() {
        let csv = csv_from_string("a,b,c\n1,2,3\n4,5,6").unwrap();
        assert_eq!(csv.headers, vec!["a", "b", "c"]);
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(csv.rows[1], vec!["4", "5", "6"]);
    }

    #[test]
    fn test_read_csv_empty_data() {
        let result = csv_from_string("x,y\n");
        assert!(result.unwrap_err().to_string().contains("at least one data row"));
    }

    #[test]
    fn test_read_csv_short_row() {
        let result = csv_from_string("x,y,z\n1,10,100\n2,20");
        assert!(result.unwrap_err().to_string().contains("record"));
    }

    #[test]
    fn test_infer_headers() {
        let csv = csv_from_string("name,pop,code\nA,10,x1\nB,,2\nC,30.5,3").unwrap();
        let headers = infer_headers(&csv, &[]);
        assert_eq!(headers[0].kind, HeaderKind::Text);
        assert_eq!(headers[1].kind, HeaderKind::Number);
        assert_eq!(headers[2].kind, HeaderKind::Text);

        let empty = csv_from_string("a,b\n,1").unwrap();
        assert_eq!(infer_headers(&empty, &[])[0].kind, HeaderKind::Text);
    }

    #[test]
    fn test_point_data_detects_coordinates() {
        let csv = csv_from_string("City,Latitude,Lng,pop\nOulu,65.01,25.47,200000\nKemi,65.73,24.56,").unwrap();
        let data = to_point_data(&csv, None, None).unwrap();
        assert_eq!(data.headers, vec![Header::text("City"), Header::number("pop")]);
        assert_eq!(data.features.len(), 2);

        let oulu = data.features.get(0).unwrap();
        assert_eq!(oulu.geometry(), Coordinate { lat: 65.01, lon: 25.47 });
        assert_eq!(oulu.number("pop"), Some(200000.0));
        assert_eq!(oulu.property("City"), Some(&PropertyValue::Text("Oulu".into())));

        let kemi = data.features.get(1).unwrap();
        assert_eq!(kemi.property("pop"), None);
    }

    #[test]
    fn test_point_data_explicit_columns() {
        let csv = csv_from_string("a,b,v\n1,2,3").unwrap();
        let data = to_point_data(&csv, Some("b"), Some("0")).unwrap();
        assert_eq!(data.features.get(0).unwrap().geometry(), Coordinate { lat: 2.0, lon: 1.0 });
        assert_eq!(data.headers, vec![Header::number("v")]);
    }

    #[test]
    fn test_point_data_missing_coordinates() {
        let csv = csv_from_string("x,y\n1,10").unwrap();
        let result = to_point_data(&csv, None, None);
        assert!(result.unwrap_err().to_string().contains("No latitude column"));
    }

    #[test]
    fn test_point_data_bad_coordinate() {
        let csv = csv_from_string("lat,lon\n1,2\nnorth,3").unwrap();
        let result = to_point_data(&csv, None, None);
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to parse coordinate 'north'"));
        assert!(message.contains("row 2"));
    }
}
