pub mod predict;
pub mod tree;

pub use tree::Tree;

// Unit-testing
#[cfg(test)]
mod tests {
    use super::Tree;
    use crate::data::DenseMatrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn separable() -> (DenseMatrix, Vec<u8>) {
        // Column 0 separates the classes, column 1 is noise.
        let data = vec![
            1.0, 5.0, //
            2.0, 3.0, //
            3.0, 5.0, //
            10.0, 3.0, //
            11.0, 5.0, //
            12.0, 4.0,
        ];
        (DenseMatrix::new(data, 6, 2), vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_tree_fit_separable() {
        let (data, y) = separable();
        let mut rng = StdRng::seed_from_u64(0);
        let mut tree = Tree::new();
        tree.fit(&data, &y, (0..6).collect(), &[1.0; 6], 2, &mut rng);
        println!("{}", tree);

        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.n_leaves, 2);
        assert_eq!(tree.depth, 1);
        let root = &tree.nodes[0];
        assert_eq!(root.split_feature, 0);
        assert_eq!(root.split_value, 6.5);
        assert_eq!(tree.predict(&data), vec![0., 0., 0., 1., 1., 1.]);
        assert_eq!(tree.calculate_importance_impurity(2), vec![1.0, 0.0]);
    }

    #[test]
    fn test_tree_weights_and_expectation() {
        let (data, y) = separable();
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree = Tree::new();
        let weights = [1.0, 1.0, 1.0, 3.0, 3.0, 3.0];
        tree.fit(&data, &y, (0..6).collect(), &weights, 1, &mut rng);
        let root = &tree.nodes[0];
        assert_eq!(root.cover, 12.0);
        assert_eq!(root.weight_value, 0.75);
        assert!((tree.get_average_leaf_weights(0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_tree_constant_features_is_leaf() {
        let data = DenseMatrix::new(vec![1.0, 1.0, 1.0, 1.0], 4, 1);
        let y = vec![0, 1, 0, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let mut tree = Tree::new();
        tree.fit(&data, &y, (0..4).collect(), &[1.0; 4], 1, &mut rng);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.predict_row(&[1.0]), 0.5);
        assert_eq!(tree.calculate_importance_impurity(1), vec![0.0]);
    }

    #[test]
    fn test_tree_ignores_rows_outside_index() {
        let (data, y) = separable();
        let mut rng = StdRng::seed_from_u64(0);
        let mut tree = Tree::new();
        tree.fit(&data, &y, vec![0, 1, 2], &[1.0; 6], 2, &mut rng);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.predict_row(&[11.0, 5.0]), 0.0);
    }

    #[test]
    fn test_tree_validate_links() {
        let (data, y) = separable();
        let mut rng = StdRng::seed_from_u64(0);
        let mut tree = Tree::new();
        tree.fit(&data, &y, (0..6).collect(), &[1.0; 6], 2, &mut rng);
        assert!(tree.validate(2).is_ok());
        assert!(tree.validate(0).is_err());

        let mut cyclic = tree.clone();
        cyclic.nodes[0].right_child = 0;
        assert!(cyclic.validate(2).is_err());
        let mut dangling = tree;
        dangling.nodes[0].left_child = 7;
        assert!(dangling.validate(2).is_err());
        assert!(Tree::new().validate(2).is_err());
    }
}
