use chrono::NaiveDateTime;
use polars::prelude::*;
use crate::data::types::Observation;
use crate::error::ForecastResult;
use crate::forecast::types::TimestampedForecast;

pub const TIMESTAMP_COL: &str = "timestamp";
pub const TOTAL_LOAD_COL: &str = "total_load";

/// Millisecond `Datetime` column, zone-less like the database column.
fn timestamp_column(timestamps: &[NaiveDateTime]) -> ForecastResult<Column> {
    let millis: Vec<i64> = timestamps
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();

    let column = Column::new(TIMESTAMP_COL.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(column)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().into_iter().map(|n| n.to_string()).collect()
}

/// `timestamp, total_load`, ascending.
pub fn from_observations(rows: &[Observation]) -> ForecastResult<DataFrame> {
    let timestamps: Vec<NaiveDateTime> = rows.iter().map(|r| r.timestamp).collect();
    let loads: Vec<f64> = rows.iter().map(|r| r.total_load).collect();

    let df = DataFrame::new(vec![
        timestamp_column(&timestamps)?,
        Column::new(TOTAL_LOAD_COL.into(), loads),
    ])?;

    Ok(df.lazy().sort([TIMESTAMP_COL], Default::default()).collect()?)
}

/// `timestamp`, `mean`, then quantiles ascending; one row per forecast step.
pub fn from_forecast(forecast: &TimestampedForecast) -> ForecastResult<DataFrame> {
    let mut columns = vec![timestamp_column(&forecast.timestamp)?];
    for name in forecast.prediction.series_names() {
        if let Some(values) = forecast.prediction.get(name) {
            columns.push(Column::new(name.into(), values.to_vec()));
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Stack frames (columns unioned, missing cells null). Rows sharing a
/// timestamp collapse into one; the later frame's row wins.
pub fn concat(frames: &[DataFrame]) -> ForecastResult<DataFrame> {
    if frames.is_empty() {
        return Ok(DataFrame::new(vec![timestamp_column(&[])?])?);
    }

    let lazy: Vec<LazyFrame> = frames.iter().map(|df| df.clone().lazy()).collect();
    let df = concat_lf_diagonal(lazy, UnionArgs::default())?
        .unique_stable(Some(vec![TIMESTAMP_COL.into()]), UniqueKeepStrategy::Last)
        .sort([TIMESTAMP_COL], Default::default())
        .collect()?;

    Ok(df)
}

/// Full outer join on `timestamp`, ascending. Rows unique to one side get
/// nulls for the other side's columns; columns named on both sides are
/// suffixed `_x` (left) and `_y` (right).
pub fn outer_join(left: &DataFrame, right: &DataFrame) -> ForecastResult<DataFrame> {
    let left_names = column_names(left);
    let right_names = column_names(right);

    let renamed = |names: &[String], other: &[String], suffix: &str| -> Vec<Expr> {
        names
            .iter()
            .map(|name| {
                if name != TIMESTAMP_COL && other.contains(name) {
                    col(name.as_str()).alias(format!("{}{}", name, suffix).as_str())
                } else {
                    col(name.as_str())
                }
            })
            .collect()
    };

    let left_lf = left.clone().lazy().select(renamed(&left_names, &right_names, "_x"));
    let right_lf = right.clone().lazy().select(renamed(&right_names, &left_names, "_y"));

    let df = left_lf
        .join(
            right_lf,
            [col(TIMESTAMP_COL)],
            [col(TIMESTAMP_COL)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .sort([TIMESTAMP_COL], Default::default())
        .collect()?;

    Ok(df)
}
