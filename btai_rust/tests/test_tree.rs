//! Tests for the generic tree-search planner.

use approx::assert_abs_diff_eq;
use btai_rust::BtaiError;
use btai_rust::graph::{FactorGraph, VarId};
use btai_rust::inference::VmpConfig;
use btai_rust::math::{kl_categorical, uniform_vector};
use btai_rust::planning::{
    ActionSelection, AlgoTree, AlgoTreeConfig, Evaluation, NodeSelection, Propagation,
};
use ndarray::{Array2, Array3, array};

const N_ACTIONS: usize = 3;

fn likelihood() -> Array2<f64> {
    Array2::from_elem((2, 2), 0.5)
}

fn transitions() -> Array3<f64> {
    Array3::from_elem((2, 2, N_ACTIONS), 0.5)
}

/// One past step: `s0 → s1` under an unknown action, both states observed.
fn context() -> (FactorGraph, VarId) {
    let mut g = FactorGraph::new();
    let a0 = g.categorical(uniform_vector(N_ACTIONS)).unwrap();
    let s0 = g.categorical(uniform_vector(2)).unwrap();
    let o0 = g.transition(s0, likelihood()).unwrap();
    g.set_observed(o0, array![1.0, 0.0]).unwrap();
    let s1 = g.active_transition(s0, a0, transitions()).unwrap();
    let o1 = g.transition(s1, likelihood()).unwrap();
    g.set_observed(o1, array![0.0, 1.0]).unwrap();
    g.set_tree_root(s1).unwrap();
    (g, s1)
}

fn config() -> AlgoTreeConfig {
    AlgoTreeConfig::new(N_ACTIONS, uniform_vector(2), uniform_vector(2)).with_seed(42)
}

/// Three plain children of `root` with the given costs.
fn children_with_costs(g: &mut FactorGraph, root: VarId, costs: [f64; 3]) -> [VarId; 3] {
    let mut out = [root; 3];
    for (slot, cost) in out.iter_mut().zip(costs) {
        let c = g.transition(root, likelihood()).unwrap();
        g.var_mut(c).unwrap().stats.cost = cost;
        *slot = c;
    }
    out
}

fn stats(g: &FactorGraph, v: VarId) -> (usize, f64) {
    let s = &g.var(v).unwrap().stats;
    (s.visits, s.cost)
}

#[test]
fn test_first_node_selection_returns_root() {
    let (g, root) = context();
    let mut algo = AlgoTree::new(config().with_propagation(Propagation::Downward));
    assert_eq!(algo.node_selection(&g).unwrap(), root);
    assert_eq!(algo.frontier().len(), 1);
}

#[test]
fn test_unexplored_actions() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config());
    assert_eq!(algo.unexplored_actions(&g, root).unwrap(), vec![0, 1, 2]);

    let node = algo.node_selection(&g).unwrap();
    let (s, _) = algo.expansion(&mut g, node, &likelihood(), &transitions()).unwrap();
    let taken = g.var(s).unwrap().stats.action.unwrap();
    let remaining = algo.unexplored_actions(&g, root).unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(!remaining.contains(&taken));
}

#[test]
fn test_expansion_stops_at_max_depth_one() {
    let (mut g, _) = context();
    let mut algo = AlgoTree::new(config().with_max_tree_depth(1));
    for _ in 0..3 {
        let node = algo.node_selection(&g).unwrap();
        algo.expansion(&mut g, node, &likelihood(), &transitions()).unwrap();
    }
    let node = algo.node_selection(&g).unwrap();
    assert!(algo.expansion(&mut g, node, &likelihood(), &transitions()).is_err());
}

#[test]
fn test_expansion_stops_at_max_depth_two() {
    let (mut g, _) = context();
    let mut algo = AlgoTree::new(
        config()
            .with_max_tree_depth(2)
            .with_node_selection(NodeSelection::Min),
    );
    for _ in 0..12 {
        let node = algo.node_selection(&g).unwrap();
        algo.expansion(&mut g, node, &likelihood(), &transitions()).unwrap();
    }
    let node = algo.node_selection(&g).unwrap();
    let err = algo.expansion(&mut g, node, &likelihood(), &transitions()).unwrap_err();
    assert!(matches!(err, BtaiError::NoUnexploredAction(_)));
    assert!(algo.frontier().len() <= 1);
}

#[test]
fn test_expansion_at_max_depth_marks_pruned() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config().with_max_tree_depth(1));
    let node = algo.node_selection(&g).unwrap();
    let (s, _) = algo.expansion(&mut g, node, &likelihood(), &transitions()).unwrap();
    assert!(g.var(s).unwrap().stats.pruned);
    assert!(!g.var(root).unwrap().stats.pruned);
    assert!(matches!(
        algo.expansion(&mut g, s, &likelihood(), &transitions()),
        Err(BtaiError::MaxDepthReached { depth: 1 })
    ));
}

#[test]
fn test_upward_propagation() {
    let (mut g, root) = context();
    let algo = AlgoTree::new(config());
    g.var_mut(root).unwrap().stats.cost = 1.0;
    let [c0, c1, c2] = children_with_costs(&mut g, root, [2.0, 3.0, 4.0]);

    algo.propagation(&mut g, c0, root).unwrap();
    assert_eq!(stats(&g, root), (1, 3.0));
    assert_eq!(stats(&g, c0), (1, 2.0));

    algo.propagation(&mut g, c1, root).unwrap();
    assert_eq!(stats(&g, root), (2, 6.0));

    algo.propagation(&mut g, c2, root).unwrap();
    assert_eq!(stats(&g, root), (3, 10.0));

    algo.propagation(&mut g, c1, root).unwrap();
    assert_eq!(stats(&g, root), (4, 13.0));
    assert_eq!(stats(&g, c0), (1, 2.0));
    assert_eq!(stats(&g, c1), (2, 3.0));
    assert_eq!(stats(&g, c2), (1, 4.0));
}

#[test]
fn test_noop_propagation_only_counts_visits() {
    let (mut g, root) = context();
    let algo = AlgoTree::new(config().with_propagation(Propagation::NoOp));
    g.var_mut(root).unwrap().stats.cost = 1.0;
    let [c0, c1, c2] = children_with_costs(&mut g, root, [2.0, 3.0, 4.0]);

    for c in [c0, c1, c2, c1] {
        algo.propagation(&mut g, c, root).unwrap();
    }
    assert_eq!(stats(&g, root), (4, 1.0));
    assert_eq!(stats(&g, c0), (1, 2.0));
    assert_eq!(stats(&g, c1), (2, 3.0));
    assert_eq!(stats(&g, c2), (1, 4.0));
}

#[test]
fn test_downward_propagation() {
    let (mut g, root) = context();
    let algo = AlgoTree::new(config().with_propagation(Propagation::Downward));
    g.var_mut(root).unwrap().stats.cost = 1.0;
    let [c0, c1, c2] = children_with_costs(&mut g, root, [2.0, 3.0, 4.0]);

    algo.propagation(&mut g, c0, root).unwrap();
    assert_eq!(stats(&g, c0), (1, 3.0));
    algo.propagation(&mut g, c1, root).unwrap();
    assert_eq!(stats(&g, c1), (1, 4.0));
    algo.propagation(&mut g, c2, root).unwrap();
    assert_eq!(stats(&g, c2), (1, 5.0));
    algo.propagation(&mut g, c1, root).unwrap();
    assert_eq!(stats(&g, c1), (2, 5.0));
    assert_eq!(stats(&g, root), (4, 1.0));
}

#[test]
fn test_min_upward_propagation_uses_cheapest_branch() {
    let (mut g, root) = context();
    let algo = AlgoTree::new(config().with_propagation(Propagation::MinUpward));
    let [c0, c1, _] = children_with_costs(&mut g, root, [2.0, 3.0, 4.0]);
    for (k, c) in [c0, c1].into_iter().enumerate() {
        g.var_mut(c).unwrap().stats.action = Some(k);
    }

    algo.propagation(&mut g, c1, root).unwrap();
    let (visits, cost) = stats(&g, root);
    assert_eq!(visits, 1);
    assert_abs_diff_eq!(cost, 0.9 * 2.0, epsilon = 1e-12);
}

#[test]
fn test_min_node_selection_follows_lowest_cost() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config().with_node_selection(NodeSelection::Min));
    for _ in 0..3 {
        assert_eq!(algo.node_selection(&g).unwrap(), root);
        algo.expansion(&mut g, root, &likelihood(), &transitions()).unwrap();
    }

    let frontier: Vec<VarId> = algo.frontier().into_iter().map(|(s, _)| s).collect();
    assert_eq!(frontier.len(), 3);
    for (s, cost) in frontier.iter().zip([5.0, 1.0, 3.0]) {
        g.var_mut(*s).unwrap().stats.cost = cost;
    }
    assert_eq!(algo.node_selection(&g).unwrap(), frontier[1]);

    g.var_mut(frontier[2]).unwrap().stats.cost = 0.5;
    assert_eq!(algo.node_selection(&g).unwrap(), frontier[2]);
}

fn selection_frequencies(strategy: NodeSelection, costs: [f64; 3]) -> [f64; 3] {
    const DRAWS: usize = 10_000;
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config().with_node_selection(strategy));
    for _ in 0..3 {
        algo.node_selection(&g).unwrap();
        algo.expansion(&mut g, root, &likelihood(), &transitions()).unwrap();
    }
    let frontier: Vec<VarId> = algo.frontier().into_iter().map(|(s, _)| s).collect();
    for (s, cost) in frontier.iter().zip(costs) {
        g.var_mut(*s).unwrap().stats.cost = cost;
    }

    let mut counts = [0usize; 3];
    for _ in 0..DRAWS {
        let picked = algo.node_selection(&g).unwrap();
        let i = frontier.iter().position(|&s| s == picked).unwrap();
        counts[i] += 1;
    }
    counts.map(|c| c as f64 / DRAWS as f64)
}

#[test]
fn test_sampling_node_selection_distribution() {
    // Weights −cost shifted by the largest cost: [2, 1, 0]
    let freq = selection_frequencies(NodeSelection::Sampling, [1.0, 2.0, 3.0]);
    assert_abs_diff_eq!(freq[0], 2.0 / 3.0, epsilon = 0.03);
    assert_abs_diff_eq!(freq[1], 1.0 / 3.0, epsilon = 0.03);
    assert_abs_diff_eq!(freq[2], 0.0, epsilon = 1e-12);
}

#[test]
fn test_softmax_node_selection_distribution() {
    let freq = selection_frequencies(NodeSelection::SoftmaxSampling, [1.0, 2.0, 3.0]);
    let z: f64 = [-1.0_f64, -2.0, -3.0].iter().map(|x| x.exp()).sum();
    for (i, cost) in [1.0_f64, 2.0, 3.0].iter().enumerate() {
        assert_abs_diff_eq!(freq[i], (-cost).exp() / z, epsilon = 0.03);
    }
}

#[test]
fn test_uct_node_selection_descends_to_frontier() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config().with_node_selection(NodeSelection::Uct));
    for _ in 0..3 {
        algo.node_selection(&g).unwrap();
        algo.expansion(&mut g, root, &likelihood(), &transitions()).unwrap();
    }
    let frontier: Vec<VarId> = algo.frontier().into_iter().map(|(s, _)| s).collect();
    for s in &frontier {
        g.var_mut(*s).unwrap().stats.visits = 1;
    }
    g.var_mut(frontier[0]).unwrap().stats.cost = 4.0;
    g.var_mut(frontier[1]).unwrap().stats.cost = 0.5;
    g.var_mut(frontier[2]).unwrap().stats.cost = 2.0;
    g.var_mut(root).unwrap().stats.visits = 3;

    assert_eq!(algo.node_selection(&g).unwrap(), frontier[1]);
}

#[test]
fn test_double_kl_evaluation_is_zero_when_posterior_matches_preferences() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(
        config()
            .with_node_selection(NodeSelection::Min)
            .with_evaluation(Evaluation::DoubleKl),
    );
    for _ in 0..3 {
        algo.expansion(&mut g, root, &likelihood(), &transitions()).unwrap();
        assert_abs_diff_eq!(algo.evaluation(&mut g).unwrap(), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_double_kl_evaluation_with_state_preferences() {
    let (mut g, root) = context();
    let state_pref = array![0.3, 0.7];
    let conf = AlgoTreeConfig::new(N_ACTIONS, state_pref.clone(), uniform_vector(2))
        .with_node_selection(NodeSelection::Min)
        .with_evaluation(Evaluation::DoubleKl);
    let mut algo = AlgoTree::new(conf);
    let expected = kl_categorical(uniform_vector(2).view(), state_pref.view()).unwrap();
    assert_abs_diff_eq!(expected, 0.087_176_693_572_388_9, epsilon = 1e-12);

    let mut last = root;
    for _ in 0..3 {
        let (s, _) = algo.expansion(&mut g, root, &likelihood(), &transitions()).unwrap();
        assert_abs_diff_eq!(algo.evaluation(&mut g).unwrap(), expected, epsilon = 1e-12);
        last = s;
    }
    algo.expansion(&mut g, last, &likelihood(), &transitions()).unwrap();
    assert_abs_diff_eq!(algo.evaluation(&mut g).unwrap(), expected, epsilon = 1e-12);
}

#[test]
fn test_efe_evaluation() {
    let (mut g, root) = context();
    let conf = AlgoTreeConfig::new(N_ACTIONS, uniform_vector(2), array![0.3, 0.7])
        .with_node_selection(NodeSelection::Min)
        .with_evaluation(Evaluation::Efe);
    let mut algo = AlgoTree::new(conf);

    let (s, o) = algo.expansion(&mut g, root, &likelihood(), &transitions()).unwrap();
    let cost = algo.evaluation(&mut g).unwrap();
    // KL[uniform ‖ (0.3, 0.7)] + ln 2
    assert_abs_diff_eq!(cost, 0.780_323_874_132_334_2, epsilon = 1e-12);
    assert_abs_diff_eq!(g.var(s).unwrap().stats.cost, cost);
    assert_eq!(algo.last_expanded_nodes(), vec![s, o]);
}

#[test]
fn test_evaluation_requires_expansion() {
    let algo = AlgoTree::new(config());
    let (mut g, _) = context();
    assert!(matches!(algo.evaluation(&mut g), Err(BtaiError::NothingToEvaluate)));
}

#[test]
fn test_action_selection_prefers_most_visited() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config());
    let children = children_with_costs(&mut g, root, [0.0, 0.0, 0.0]);
    for (k, c) in children.iter().enumerate() {
        g.var_mut(*c).unwrap().stats.action = Some(k);
    }

    let bump = |g: &mut FactorGraph, i: usize, n: usize| {
        g.var_mut(children[i]).unwrap().stats.visits += n;
    };
    bump(&mut g, 0, 1);
    assert_eq!(algo.action_selection(&g, root).unwrap(), 0);
    bump(&mut g, 1, 2);
    assert_eq!(algo.action_selection(&g, root).unwrap(), 1);
    bump(&mut g, 2, 3);
    assert_eq!(algo.action_selection(&g, root).unwrap(), 2);
    bump(&mut g, 0, 3);
    assert_eq!(algo.action_selection(&g, root).unwrap(), 0);
}

#[test]
fn test_action_selection_breaks_ties_by_cost() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config());
    let children = children_with_costs(&mut g, root, [3.0, 1.0, 2.0]);
    for (k, c) in children.iter().enumerate() {
        g.var_mut(*c).unwrap().stats.action = Some(k);
    }
    assert_eq!(algo.action_selection(&g, root).unwrap(), 1);

    let mut algo = AlgoTree::new(config().with_action_selection(ActionSelection::MinAverageCost));
    g.var_mut(children[0]).unwrap().stats.visits = 6;
    assert_eq!(algo.action_selection(&g, root).unwrap(), 0);
}

#[test]
fn test_action_selection_without_children() {
    let (g, root) = context();
    let mut algo = AlgoTree::new(config());
    assert!(matches!(algo.action_selection(&g, root), Err(BtaiError::EmptyTree)));
}

#[test]
fn test_softmax_visits_action_selection() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config().with_action_selection(ActionSelection::SoftmaxVisits));
    let children = children_with_costs(&mut g, root, [0.0, 0.0, 0.0]);
    for (k, c) in children.iter().enumerate() {
        g.var_mut(*c).unwrap().stats.action = Some(k);
    }

    // Equal visits: every action gets drawn
    let mut seen = [false; N_ACTIONS];
    for _ in 0..300 {
        seen[algo.action_selection(&g, root).unwrap()] = true;
    }
    assert!(seen.iter().all(|&s| s), "drawn actions {seen:?}");

    // One child dominates the visit counts
    g.var_mut(children[1]).unwrap().stats.visits = 60;
    for _ in 0..100 {
        assert_eq!(algo.action_selection(&g, root).unwrap(), 1);
    }
}

#[test]
fn test_last_expanded_nodes() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(config().with_node_selection(NodeSelection::Min));
    assert!(algo.last_expanded_nodes().is_empty());

    let node = algo.node_selection(&g).unwrap();
    algo.expansion(&mut g, node, &likelihood(), &transitions()).unwrap();
    let nodes = algo.last_expanded_nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(g.parent_var(nodes[0]).unwrap(), Some(root));
    assert_eq!(g.parent_var(nodes[1]).unwrap(), Some(nodes[0]));
}

#[test]
fn test_plan_grows_tree_and_returns_action() {
    let (mut g, root) = context();
    let mut algo = AlgoTree::new(
        config()
            .with_node_selection(NodeSelection::Min)
            .with_evaluation(Evaluation::DoubleKl),
    );
    let before = g.n_vars();
    let action = algo
        .plan(&mut g, &likelihood(), &transitions(), 30, &VmpConfig::default())
        .unwrap();
    assert!(action < N_ACTIONS);
    assert_eq!(g.n_vars(), before + 60);
    assert_eq!(g.var(root).unwrap().stats.visits, 30);
}

#[test]
fn test_plan_stops_when_tree_is_full() {
    let (mut g, _) = context();
    let mut algo = AlgoTree::new(config().with_max_tree_depth(1));
    let before = g.n_vars();
    algo.plan(&mut g, &likelihood(), &transitions(), 50, &VmpConfig::default())
        .unwrap();
    assert_eq!(g.n_vars(), before + 2 * N_ACTIONS);
}
