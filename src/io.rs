/*!
# I/O Utilities for Saving Populations to CSV

This module provides a function to save the particle populations of a run to
a CSV file. Enable via the `csv` feature.
*/

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::error::{Error, Result};
use crate::smc::WsmcRun;

/**
Saves every generation of a run as a CSV file.

The resulting CSV file will have:
- A header row containing `"generation"`, `"particle"`, `"distance"`, and one
  column per parameter dimension named `"theta_0"`, `"theta_1"`, etc.
- One subsequent row per particle per generation.

# Examples

```rust,no_run
use wsmc::io::save_population_csv;
# fn demo(run: &wsmc::smc::WsmcRun) -> wsmc::Result<()> {
save_population_csv(run, "/tmp/populations.csv")?;
# Ok(())
# }
```
*/
pub fn save_population_csv<P: AsRef<Path>>(run: &WsmcRun, filename: P) -> Result<()> {
    let file = File::create(filename).map_err(|e| Error::Io(e.to_string()))?;
    let mut wtr = Writer::from_writer(file);

    let n_dims = run
        .generations
        .first()
        .map(|g| g.thetas.ncols())
        .unwrap_or(0);
    let mut header: Vec<String> = vec![
        "generation".to_string(),
        "particle".to_string(),
        "distance".to_string(),
    ];
    header.extend((0..n_dims).map(|i| format!("theta_{i}")));
    wtr.write_record(&header)
        .map_err(|e| Error::Io(e.to_string()))?;

    for (generation_idx, generation) in run.generations.iter().enumerate() {
        for (particle_idx, theta) in generation.thetas.rows().into_iter().enumerate() {
            let mut row = vec![
                generation_idx.to_string(),
                particle_idx.to_string(),
                generation.distances[particle_idx].to_string(),
            ];
            row.extend(theta.iter().map(|v| v.to_string()));
            wtr.write_record(&row).map_err(|e| Error::Io(e.to_string()))?;
        }
    }

    wtr.flush().map_err(|e| Error::Io(e.to_string()))?;
    Ok(())
}
