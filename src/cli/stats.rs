use anyhow::Result;

use loci_flow::config::FlowConfig;

/// Display store statistics in the terminal.
pub fn stats(config: &FlowConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let response = store.stats()?;

    println!("Flow Store Statistics");
    println!("{}", "=".repeat(40));
    println!("  Events:              {}", response.events);
    println!("  Sessions:            {}", response.sessions);
    println!("  Relations:           {}", response.relations);
    println!("  Flows:               {}", response.flows);
    println!();

    if !response.relations_by_type.is_empty() {
        println!("Relations by type:");
        for (kind, count) in &response.relations_by_type {
            println!("  {:<18} {}", kind, count);
        }
        println!();
    }

    if let Some(ref oldest) = response.oldest_event {
        println!("Oldest event:          {oldest}");
    }
    if let Some(ref newest) = response.newest_event {
        println!("Newest event:          {newest}");
    }

    let recent = store.list_flows(5)?;
    if !recent.is_empty() {
        println!();
        println!("Recent flows:");
        for f in recent {
            println!(
                "  {} {} ({} nodes, {} edges) {}",
                f.created_at,
                f.id,
                f.node_count,
                f.edge_count,
                f.session_id.as_deref().unwrap_or("-"),
            );
        }
    }

    Ok(())
}
