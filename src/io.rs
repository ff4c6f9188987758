use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::as_graph::{ASGraph, ASN};
use crate::engine::SimulationEngine;
use crate::shared::{Relationships, SimError};

/// Loads a CAIDA-style relationships file: `ASN1|ASN2|REL[|LABEL]`, REL -1
/// meaning ASN1 is provider of ASN2 and 0 meaning peers. Empty and `#` lines
/// are ignored; unknown REL values and short lines are skipped silently; a
/// trailing label field is discarded.
pub fn load_relationships(path: &Path) -> Result<ASGraph, SimError> {
    let file = File::open(path).map_err(|e| SimError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut graph = ASGraph::new();
    let mut loaded = 0u64;

    for line in reader.lines() {
        let line = line.map_err(|e| SimError::io(path, e))?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Pipes are the canonical separator; normalize and tokenize
        let normalized = line.replace('|', " ");
        let fields: Vec<&str> = normalized.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }

        let (asn1, asn2, rel) = match (
            fields[0].parse::<ASN>(),
            fields[1].parse::<ASN>(),
            fields[2].parse::<i32>(),
        ) {
            (Ok(asn1), Ok(asn2), Ok(rel)) => (asn1, asn2, rel),
            _ => continue,
        };

        match rel {
            -1 => graph.add_relationship(asn1, asn2, Relationships::Customers),
            0 => graph.add_relationship(asn1, asn2, Relationships::Peers),
            _ => continue,
        }
        loaded += 1;
    }

    let (up, across, down) = graph.edge_stats();
    info!(
        "loaded {} relationships for {} ASNs",
        loaded,
        graph.len()
    );
    debug!(
        "graph stats - customer edges: {}, peer edges: {}, provider edges: {}",
        up, across, down
    );

    Ok(graph)
}

/// Loads the announcements CSV (`seed_asn, prefix, rov_invalid`, one header
/// line) and seeds each row into the engine. The third field is truthy iff
/// it contains `True`, `true`, or `1`. Returns the number of rows seeded.
pub fn load_announcements(
    path: &Path,
    engine: &mut SimulationEngine,
) -> Result<u64, SimError> {
    let file = File::open(path).map_err(|e| SimError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();

    // Header
    if let Some(header) = lines.next() {
        header.map_err(|e| SimError::io(path, e))?;
    }

    let mut count = 0u64;
    for line in lines {
        let line = line.map_err(|e| SimError::io(path, e))?;
        let mut fields = line.splitn(3, ',');
        let (seed_asn, prefix, rov_invalid) =
            match (fields.next(), fields.next(), fields.next()) {
                (Some(seed_asn), Some(prefix), Some(rov_invalid)) => {
                    (seed_asn, prefix, rov_invalid)
                }
                _ => continue,
            };

        let origin = seed_asn.trim().parse::<ASN>().map_err(|_| {
            SimError::BadAnnouncement {
                path: path.to_path_buf(),
                row: line.clone(),
            }
        })?;
        let rov_invalid = rov_invalid.contains("True")
            || rov_invalid.contains("true")
            || rov_invalid.contains('1');

        engine.seed_announcement(origin, prefix.to_string(), rov_invalid);
        count += 1;
    }

    Ok(count)
}

/// Loads the ROV-enabled ASN list, one decimal ASN per line. Empty and `#`
/// lines are ignored and malformed lines skipped with a warning. An
/// unreadable file yields an empty set: ROV simply stays disabled.
pub fn load_rov_asns(path: &Path) -> HashSet<ASN> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("could not open ROV ASNs file {}: {}", path.display(), e);
            return HashSet::new();
        }
    };

    let mut rov_asns = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<ASN>() {
            Ok(asn) => {
                rov_asns.insert(asn);
            }
            Err(_) => warn!("skipping invalid ROV ASN: {}", line),
        }
    }

    rov_asns
}

/// Writes the converged RIBs as CSV: header `asn,prefix,as_path`, rows
/// sorted ascending by (asn, prefix, formatted path), the path cell quoted.
pub fn write_ribs_csv(path: &Path, engine: &SimulationEngine) -> Result<(), SimError> {
    let file = File::create(path).map_err(|e| SimError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "asn,prefix,as_path").map_err(|e| SimError::io(path, e))?;

    let mut entries: Vec<(ASN, &str, String)> = Vec::with_capacity(engine.rib_count());
    for (&asn, rib) in engine.ribs() {
        for (prefix, route) in rib {
            entries.push((asn, prefix.as_str(), format_as_path(&route.as_path)));
        }
    }
    entries.sort();

    for (asn, prefix, as_path) in &entries {
        writeln!(writer, "{},{},\"{}\"", asn, prefix, as_path)
            .map_err(|e| SimError::io(path, e))?;
    }
    writer.flush().map_err(|e| SimError::io(path, e))?;

    Ok(())
}

/// Python-tuple rendering: `(a, b, c)`, with the one-element form `(a,)`.
fn format_as_path(as_path: &[ASN]) -> String {
    let mut out = String::from("(");
    for (i, asn) in as_path.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&asn.to_string());
    }
    if as_path.len() == 1 {
        out.push(',');
    }
    out.push(')');
    out
}
