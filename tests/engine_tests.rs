use std::collections::HashSet;

use ribgen::as_graph::{ASGraph, ASN};
use ribgen::engine::{RankTable, Route, SimulationEngine};
use ribgen::shared::Relationships;

/// `provider` is provider of `customer`
fn provides(graph: &mut ASGraph, provider: ASN, customer: ASN) {
    graph.add_relationship(provider, customer, Relationships::Customers);
}

fn peers(graph: &mut ASGraph, asn1: ASN, asn2: ASN) {
    graph.add_relationship(asn1, asn2, Relationships::Peers);
}

fn installed_path(engine: &SimulationEngine, asn: ASN, prefix: &str) -> Option<Vec<ASN>> {
    engine
        .rib(asn)
        .and_then(|rib| rib.get(prefix))
        .map(|route| route.as_path.clone())
}

fn route(prefix: &str, as_path: Vec<ASN>, learned_from: Relationships) -> Route {
    Route {
        prefix: prefix.to_string(),
        as_path,
        learned_from,
        rov_invalid: false,
    }
}

#[test]
fn test_rank_assignment_chain() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    provides(&mut graph, 2, 3);

    let ranks = RankTable::build(&graph);
    assert_eq!(ranks.rank_of(3), Some(0));
    assert_eq!(ranks.rank_of(2), Some(1));
    assert_eq!(ranks.rank_of(1), Some(2));
    assert_eq!(ranks.rank_to_asns.len(), 3);
}

#[test]
fn test_rank_of_edgeless_origin_is_zero() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    graph.register_asn(777);

    let ranks = RankTable::build(&graph);
    assert_eq!(ranks.rank_of(777), Some(0));
}

#[test]
fn test_line_propagation() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    provides(&mut graph, 2, 3);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(3, "10.0.0.0/24".to_string(), false);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 3, "10.0.0.0/24"), Some(vec![3]));
    assert_eq!(installed_path(&engine, 2, "10.0.0.0/24"), Some(vec![2, 3]));
    assert_eq!(installed_path(&engine, 1, "10.0.0.0/24"), Some(vec![1, 3]));

    // Lifted over customer->provider edges, so every hop learned from a customer
    let at_2 = engine.rib(2).unwrap().get("10.0.0.0/24").unwrap();
    assert_eq!(at_2.learned_from, Relationships::Customers);
}

#[test]
fn test_peer_propagation() {
    let mut graph = ASGraph::new();
    peers(&mut graph, 1, 2);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(1, "10.0.0.0/24".to_string(), false);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 1, "10.0.0.0/24"), Some(vec![1]));
    assert_eq!(installed_path(&engine, 2, "10.0.0.0/24"), Some(vec![2, 1]));

    let at_2 = engine.rib(2).unwrap().get("10.0.0.0/24").unwrap();
    assert_eq!(at_2.learned_from, Relationships::Peers);
}

#[test]
fn test_valley_prohibition() {
    // 1 climbs to its provider 2, crosses the 2-3 peering, and must stop
    // there: 3 will not re-export a peer-learned route to its provider 4
    let mut graph = ASGraph::new();
    provides(&mut graph, 2, 1);
    peers(&mut graph, 2, 3);
    provides(&mut graph, 4, 3);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(1, "10.0.0.0/24".to_string(), false);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 1, "10.0.0.0/24"), Some(vec![1]));
    assert_eq!(installed_path(&engine, 2, "10.0.0.0/24"), Some(vec![2, 1]));
    assert_eq!(
        installed_path(&engine, 3, "10.0.0.0/24"),
        Some(vec![3, 2, 1])
    );
    assert_eq!(installed_path(&engine, 4, "10.0.0.0/24"), None);
}

#[test]
fn test_tie_break_by_next_hop() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 3);
    provides(&mut graph, 2, 3);
    provides(&mut graph, 1, 4);
    provides(&mut graph, 2, 4);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(3, "p".to_string(), false);
    engine.propagate().expect("must converge");

    // Both (4,1,3) and (4,2,3) are provider-learned and length 3;
    // the smaller next hop wins
    assert_eq!(installed_path(&engine, 4, "p"), Some(vec![4, 1, 3]));
    assert_eq!(installed_path(&engine, 1, "p"), Some(vec![1, 3]));
    assert_eq!(installed_path(&engine, 2, "p"), Some(vec![2, 3]));
}

#[test]
fn test_rov_drops_invalid_at_adopting_as() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    provides(&mut graph, 2, 3);

    let mut engine = SimulationEngine::new(graph);
    engine.set_rov_asns(HashSet::from([2]));
    engine.seed_announcement(3, "p".to_string(), true);
    engine.propagate().expect("must converge");

    // AS 2 filters the invalid route, which also starves AS 1 of it
    assert_eq!(installed_path(&engine, 3, "p"), Some(vec![3]));
    assert_eq!(installed_path(&engine, 2, "p"), None);
    assert_eq!(installed_path(&engine, 1, "p"), None);
}

#[test]
fn test_non_adopting_as_accepts_invalid() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(2, "p".to_string(), true);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 1, "p"), Some(vec![1, 2]));
}

#[test]
fn test_customer_route_preferred_over_peer_route() {
    // 3 is a customer of both 1 and 2, which peer with each other. After
    // the peer exchange, each keeps the direct customer route
    let mut graph = ASGraph::new();
    peers(&mut graph, 1, 2);
    provides(&mut graph, 1, 3);
    provides(&mut graph, 2, 3);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(3, "p".to_string(), false);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 1, "p"), Some(vec![1, 3]));
    assert_eq!(installed_path(&engine, 2, "p"), Some(vec![2, 3]));
}

#[test]
fn test_parallel_edges_keep_single_entry() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    provides(&mut graph, 1, 2);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(2, "p".to_string(), false);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 1, "p"), Some(vec![1, 2]));
    assert_eq!(engine.rib(1).unwrap().len(), 1);
}

#[test]
fn test_export_policy_table() {
    let from_customer = route("p", vec![1, 2], Relationships::Customers);
    let from_peer = route("p", vec![1, 2], Relationships::Peers);
    let from_provider = route("p", vec![1, 2], Relationships::Providers);

    for outbound in [
        Relationships::Providers,
        Relationships::Peers,
        Relationships::Customers,
    ] {
        assert!(SimulationEngine::can_export(&from_customer, outbound));
    }

    for r in [&from_peer, &from_provider] {
        assert!(SimulationEngine::can_export(r, Relationships::Customers));
        assert!(!SimulationEngine::can_export(r, Relationships::Peers));
        assert!(!SimulationEngine::can_export(r, Relationships::Providers));
    }
}

#[test]
fn test_decision_relationship_class_first() {
    // A longer customer route still beats a shorter provider route
    let customer = route("p", vec![9, 5, 6, 7], Relationships::Customers);
    let provider = route("p", vec![9, 8], Relationships::Providers);

    assert!(SimulationEngine::better_route(&customer, &provider, false));
    assert!(!SimulationEngine::better_route(&provider, &customer, false));
}

#[test]
fn test_decision_path_length_second() {
    let short = route("p", vec![9, 5, 7], Relationships::Customers);
    let long = route("p", vec![9, 6, 8, 7], Relationships::Customers);

    assert!(SimulationEngine::better_route(&short, &long, false));
    assert!(!SimulationEngine::better_route(&long, &short, false));
}

#[test]
fn test_decision_next_hop_last() {
    let via_1 = route("p", vec![4, 1, 3], Relationships::Providers);
    let via_2 = route("p", vec![4, 2, 3], Relationships::Providers);

    assert!(SimulationEngine::better_route(&via_1, &via_2, false));
    assert!(!SimulationEngine::better_route(&via_2, &via_1, false));
}

#[test]
fn test_decision_identity_tie_keeps_incumbent() {
    let incumbent = route("p", vec![4, 1, 3], Relationships::Providers);
    let challenger = incumbent.clone();

    assert!(!SimulationEngine::better_route(
        &challenger,
        &incumbent,
        false
    ));
    assert!(!SimulationEngine::better_route(
        &challenger,
        &incumbent,
        true
    ));
}

#[test]
fn test_decision_rov_validity_outranks_class() {
    let valid_provider = route("p", vec![9, 8, 7], Relationships::Providers);
    let mut invalid_customer = route("p", vec![9, 5], Relationships::Customers);
    invalid_customer.rov_invalid = true;

    // At an adopting AS, validity is checked before everything else
    assert!(SimulationEngine::better_route(
        &valid_provider,
        &invalid_customer,
        true
    ));
    // A non-adopting AS falls through to relationship class
    assert!(!SimulationEngine::better_route(
        &valid_provider,
        &invalid_customer,
        false
    ));
}

#[test]
fn test_single_element_path_next_hop_is_origin() {
    let seed = Route::seed("p".to_string(), 7, false);
    assert_eq!(seed.next_hop(), 7);
    assert_eq!(seed.origin(), 7);
}

#[test]
fn test_installed_paths_are_loop_free_and_owned() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 3);
    provides(&mut graph, 2, 3);
    provides(&mut graph, 1, 4);
    provides(&mut graph, 2, 4);
    peers(&mut graph, 1, 2);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(3, "p1".to_string(), false);
    engine.seed_announcement(4, "p2".to_string(), false);
    engine.propagate().expect("must converge");

    for (&asn, rib) in engine.ribs() {
        for route in rib.values() {
            assert_eq!(route.as_path[0], asn, "path must start at the owner");
            let unique: HashSet<ASN> = route.as_path.iter().copied().collect();
            assert_eq!(unique.len(), route.as_path.len(), "path must be loop-free");
        }
    }
}

#[test]
fn test_converged_state_is_fixed_point() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    provides(&mut graph, 2, 3);
    peers(&mut graph, 1, 4);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(3, "p".to_string(), false);
    engine.propagate().expect("must converge");

    let snapshot = engine.ribs().clone();
    engine.propagate().expect("must converge again");
    assert_eq!(engine.ribs(), &snapshot);
}

#[test]
fn test_multiple_prefixes_converge_independently() {
    let mut graph = ASGraph::new();
    provides(&mut graph, 1, 2);
    provides(&mut graph, 2, 3);

    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(3, "p1".to_string(), false);
    engine.seed_announcement(1, "p2".to_string(), false);
    engine.propagate().expect("must converge");

    // p1 climbs from the stub, p2 descends from the top provider
    assert_eq!(installed_path(&engine, 1, "p1"), Some(vec![1, 3]));
    assert_eq!(installed_path(&engine, 3, "p2"), Some(vec![3, 2, 1]));
    assert_eq!(engine.rib_count(), 6);
}

#[test]
fn test_seed_origin_without_edges_converges() {
    let graph = ASGraph::new();
    let mut engine = SimulationEngine::new(graph);
    engine.seed_announcement(42, "p".to_string(), false);
    engine.propagate().expect("must converge");

    assert_eq!(installed_path(&engine, 42, "p"), Some(vec![42]));
    assert_eq!(engine.rib_count(), 1);
}
