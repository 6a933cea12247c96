//! csv readers and writers for branch data, bounds, parameter vectors and fit history
use crate::model::data::{PairSeries, TrainingData};
use crate::model::errors::{FitError, FitResult};
use crate::model::parameters::NamedVector;
use crate::numerical::gradient_ascent::IterationEvent;
use csv::{Reader, StringRecord, Writer};
use log::info;
use nalgebra::DVector;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

const CHANNELS: [&str; 3] = ["TFE", "TGA", "TGE"];

fn number(record: &StringRecord, column: usize, what: &str) -> FitResult<f64> {
    let cell = record.get(column).unwrap_or("").trim();
    cell.parse::<f64>().map_err(|_| {
        FitError::InvalidInput(format!(
            "{}: cannot read '{}' in column {} as a number",
            what,
            cell,
            column + 1
        ))
    })
}

/// column index of every `<channel>_<k>`, k = 1..L, in the header
fn channel_columns(headers: &StringRecord) -> FitResult<Vec<Vec<usize>>> {
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let len = (1..)
        .take_while(|k| position(&format!("TFE_{}", k)).is_some())
        .count();
    CHANNELS
        .iter()
        .map(|channel| {
            (1..=len)
                .map(|k| {
                    let name = format!("{}_{}", channel, k);
                    position(&name).ok_or_else(|| {
                        FitError::InvalidInput(format!("training table has no column {}", name))
                    })
                })
                .collect::<FitResult<Vec<usize>>>()
        })
        .collect()
}

/// training table `pair,theta_s,TFE_1..TFE_L,TGA_1..TGA_L,TGE_1..TGE_L`
pub fn read_training<R: Read>(reader: R) -> FitResult<TrainingData> {
    let mut rdr = Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let pair_col = headers
        .iter()
        .position(|h| h.trim() == "pair")
        .ok_or_else(|| FitError::InvalidInput("training table has no 'pair' column".to_string()))?;
    let theta_col = headers
        .iter()
        .position(|h| h.trim() == "theta_s")
        .ok_or_else(|| {
            FitError::InvalidInput("training table has no 'theta_s' column".to_string())
        })?;
    let columns = channel_columns(&headers)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let key = record.get(pair_col).unwrap_or("").trim().to_string();
        let theta_s = number(&record, theta_col, &key)?;
        let mut series = Vec::with_capacity(3);
        for cols in columns.iter() {
            let values = cols
                .iter()
                .map(|&c| number(&record, c, &key))
                .collect::<FitResult<Vec<f64>>>()?;
            series.push(values);
        }
        let tge = series.pop().unwrap_or_default();
        let tga = series.pop().unwrap_or_default();
        let tfe = series.pop().unwrap_or_default();
        rows.push(PairSeries::new(&key, theta_s, tfe, tga, tge)?);
    }
    TrainingData::new(rows)
}

pub fn load_training<P: AsRef<Path>>(path: P) -> FitResult<TrainingData> {
    let data = read_training(std::fs::File::open(path.as_ref())?)?;
    info!(
        "loaded {} pairs x {} pseudotime points from {}",
        data.rows().len(),
        data.series_len(),
        path.as_ref().display()
    );
    Ok(data)
}

/// bounds table `name,lower,upper`
pub fn read_bounds<R: Read>(reader: R) -> FitResult<HashMap<String, (f64, f64)>> {
    let mut rdr = Reader::from_reader(reader);
    let mut table = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let name = record.get(0).unwrap_or("").trim().to_string();
        let lower = number(&record, 1, &name)?;
        let upper = number(&record, 2, &name)?;
        if table.insert(name.clone(), (lower, upper)).is_some() {
            return Err(FitError::InvalidInput(format!("bound for {} given twice", name)));
        }
    }
    Ok(table)
}

pub fn load_bounds<P: AsRef<Path>>(path: P) -> FitResult<HashMap<String, (f64, f64)>> {
    read_bounds(std::fs::File::open(path)?)
}

/// vector table `name,value`, kept in file order
pub fn read_named_vector<R: Read>(reader: R) -> FitResult<NamedVector> {
    let mut rdr = Reader::from_reader(reader);
    let mut names = Vec::new();
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let name = record.get(0).unwrap_or("").trim().to_string();
        values.push(number(&record, 1, &name)?);
        names.push(name);
    }
    NamedVector::new(names, DVector::from_vec(values))
}

pub fn load_named_vector<P: AsRef<Path>>(path: P) -> FitResult<NamedVector> {
    read_named_vector(std::fs::File::open(path)?)
}

/// time-weight table `slot,weight`; slots must be exactly 1..=k
pub fn read_time_weights<R: Read>(reader: R) -> FitResult<Vec<f64>> {
    let mut rdr = Reader::from_reader(reader);
    let mut slots: Vec<(usize, f64)> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let cell = record.get(0).unwrap_or("").trim();
        let slot = cell.parse::<usize>().map_err(|_| {
            FitError::InvalidInput(format!("time-weight slot '{}' is not a positive integer", cell))
        })?;
        slots.push((slot, number(&record, 1, "time weights")?));
    }
    slots.sort_by_key(|(slot, _)| *slot);
    for (k, (slot, _)) in slots.iter().enumerate() {
        if *slot != k + 1 {
            return Err(FitError::InvalidInput(format!(
                "time-weight slots must be 1..={} without gaps, found {}",
                slots.len(),
                slot
            )));
        }
    }
    Ok(slots.into_iter().map(|(_, w)| w).collect())
}

pub fn load_time_weights<P: AsRef<Path>>(path: P) -> FitResult<Vec<f64>> {
    read_time_weights(std::fs::File::open(path)?)
}

pub fn write_named_vector<W: Write>(named: &NamedVector, writer: W) -> FitResult<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["name", "value"])?;
    for (name, value) in named.iter() {
        wtr.write_record([name.to_string(), value.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_named_vector<P: AsRef<Path>>(named: &NamedVector, path: P) -> FitResult<()> {
    write_named_vector(named, std::fs::File::create(path.as_ref())?)?;
    info!("{} parameters saved to {}", named.len(), path.as_ref().display());
    Ok(())
}

/// accepted iterations as `iteration,value,learning_rate`
pub fn save_history<P: AsRef<Path>>(history: &[IterationEvent], path: P) -> FitResult<()> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(["iteration", "value", "learning_rate"])?;
    for event in history {
        wtr.write_record([
            event.iteration.to_string(),
            event.value.to_string(),
            event.learning_rate.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
