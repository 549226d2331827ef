use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::domain::{ElevationGrid, GeoTransform};

const DEFAULT_NODATA: f64 = -9999.0;

/// Read an ESRI ASCII grid (`.asc`) as a north-up elevation grid.
///
/// A sibling `.prj` file, when present, becomes the grid's CRS tag.
pub fn read_ascii_grid(path: &Path) -> Result<ElevationGrid> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read elevation grid: {}", path.display()))?;
    let grid = parse_ascii_grid(&contents)
        .with_context(|| format!("Invalid ASCII grid: {}", path.display()))?;

    let prj = path.with_extension("prj");
    let grid = match std::fs::read_to_string(&prj) {
        Ok(crs) if !crs.trim().is_empty() => grid.with_crs(crs.trim()),
        _ => grid,
    };

    debug!(
        path = %path.display(),
        width = grid.width(),
        height = grid.height(),
        crs = grid.crs().is_some(),
        "read elevation grid"
    );
    Ok(grid)
}

/// Parse ASCII grid text: a `key value` header followed by rows of values,
/// northernmost row first
pub fn parse_ascii_grid(contents: &str) -> Result<ElevationGrid> {
    let mut header: HashMap<String, f64> = HashMap::new();
    let mut lines = contents.lines().peekable();

    while let Some(&line) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        if key.parse::<f64>().is_ok() {
            break;
        }
        let value = tokens
            .next()
            .with_context(|| format!("header '{key}' has no value"))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("header '{key}' has non-numeric value '{value}'"))?;
        header.insert(key.to_lowercase(), value);
        lines.next();
    }

    let dim = |key: &str| -> Result<usize> {
        let value = *header.get(key).with_context(|| format!("missing '{key}' header"))?;
        if value < 1.0 || value.fract() != 0.0 {
            bail!("'{key}' must be a positive integer, got {value}");
        }
        Ok(value as usize)
    };
    let width = dim("ncols")?;
    let height = dim("nrows")?;

    let (dx, dy) = match (header.get("cellsize"), header.get("dx"), header.get("dy")) {
        (Some(&size), _, _) => (size, size),
        (None, Some(&dx), Some(&dy)) => (dx, dy),
        _ => bail!("missing 'cellsize' (or 'dx' and 'dy') header"),
    };

    // Lower-left reference, converted to the cell corner
    let left = match (header.get("xllcorner"), header.get("xllcenter")) {
        (Some(&x), _) => x,
        (None, Some(&x)) => x - dx / 2.0,
        _ => bail!("missing 'xllcorner' or 'xllcenter' header"),
    };
    let bottom = match (header.get("yllcorner"), header.get("yllcenter")) {
        (Some(&y), _) => y,
        (None, Some(&y)) => y - dy / 2.0,
        _ => bail!("missing 'yllcorner' or 'yllcenter' header"),
    };
    let nodata = header.get("nodata_value").copied().unwrap_or(DEFAULT_NODATA);

    let values = lines
        .flat_map(str::split_whitespace)
        .map(|token| {
            token
                .parse::<f64>()
                .with_context(|| format!("invalid elevation value '{token}'"))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() != width * height {
        bail!(
            "expected {} values for {width}x{height} cells, found {}",
            width * height,
            values.len()
        );
    }

    let top = bottom + height as f64 * dy;
    let transform = GeoTransform::new(left, top, dx, -dy);
    Ok(ElevationGrid::new(width, height, values, nodata, transform)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "ncols 3
nrows 2
xllcorner 100.0
yllcorner 200.0
cellsize 10
NODATA_value -1
1 2 3
4 -1 6
";

    #[test]
    fn test_parse_header_and_values() {
        let grid = parse_ascii_grid(SAMPLE).unwrap();

        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.nodata(), -1.0);
        assert_eq!(grid.get(0, 2), Some(3.0));
        assert_eq!(grid.get(1, 1), None);

        let t = grid.transform();
        assert_eq!((t.origin_x, t.origin_y), (100.0, 220.0));
        assert_eq!((t.cell_size_x, t.cell_size_y), (10.0, -10.0));
        // First row is the northern one
        assert_eq!(t.cell_center(0, 0), (105.0, 215.0));
    }

    #[test]
    fn test_center_reference_and_default_nodata() {
        let text = "NCOLS 2\nNROWS 1\nXLLCENTER 5\nYLLCENTER 5\nDX 10\nDY 2\n1 2\n";
        let grid = parse_ascii_grid(text).unwrap();

        assert_eq!(grid.nodata(), DEFAULT_NODATA);
        assert_eq!(grid.transform().origin_x, 0.0);
        assert_eq!(grid.transform().origin_y, 6.0);
        assert_eq!(grid.transform().cell_size_y, -2.0);
    }

    #[test]
    fn test_value_count_mismatch() {
        let text = SAMPLE.replace("4 -1 6", "4 -1");
        let err = parse_ascii_grid(&text).unwrap_err();
        assert!(err.to_string().contains("expected 6 values"));
    }

    #[test]
    fn test_missing_header() {
        let text = "ncols 2\nnrows 1\ncellsize 1\n1 2\n";
        assert!(parse_ascii_grid(text).is_err());
    }

    #[test]
    fn test_read_with_prj_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tile.asc");
        fs::write(&path, SAMPLE).unwrap();
        fs::write(dir.path().join("tile.prj"), "EPSG:2056\n").unwrap();

        let grid = read_ascii_grid(&path).unwrap();
        assert_eq!(grid.crs(), Some("EPSG:2056"));
    }
}
