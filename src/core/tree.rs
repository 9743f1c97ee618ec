use std::sync::Arc;

/// Immutable binary tree. Subtrees are shared, so merging two trees never
/// copies either of them.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryTree<T> {
    Empty,
    Node {
        value: T,
        left: Arc<BinaryTree<T>>,
        right: Arc<BinaryTree<T>>,
    },
}

impl<T> Default for BinaryTree<T> {
    fn default() -> Self {
        BinaryTree::Empty
    }
}

impl<T> BinaryTree<T> {
    pub fn empty() -> Self {
        BinaryTree::Empty
    }

    pub fn leaf(value: T) -> Self {
        Self::node(value, BinaryTree::Empty, BinaryTree::Empty)
    }

    pub fn node(value: T, left: BinaryTree<T>, right: BinaryTree<T>) -> Self {
        BinaryTree::Node { value, left: Arc::new(left), right: Arc::new(right) }
    }

    /// Joins two trees under `value`. The receiver becomes the right subtree
    /// and `other` the left one, so folding a sequence keeps the earlier
    /// items to the right.
    pub fn merge(self, value: T, other: BinaryTree<T>) -> Self {
        Self::node(value, other, self)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BinaryTree::Empty)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            BinaryTree::Empty => None,
            BinaryTree::Node { value, .. } => Some(value),
        }
    }

    pub fn left(&self) -> Option<&BinaryTree<T>> {
        match self {
            BinaryTree::Empty => None,
            BinaryTree::Node { left, .. } => Some(left.as_ref()),
        }
    }

    pub fn right(&self) -> Option<&BinaryTree<T>> {
        match self {
            BinaryTree::Empty => None,
            BinaryTree::Node { right, .. } => Some(right.as_ref()),
        }
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            BinaryTree::Empty => false,
            BinaryTree::Node { left, right, .. } => left.is_empty() && right.is_empty(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            BinaryTree::Empty => 0,
            BinaryTree::Node { left, right, .. } => 1 + left.height().max(right.height()),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            BinaryTree::Empty => 0,
            BinaryTree::Node { left, right, .. } => 1 + left.size() + right.size(),
        }
    }

    /// Inorder traversal visiting the right subtree, then the node, then the
    /// left subtree.
    pub fn traverse(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.size());
        self.traverse_into(&mut out);
        out
    }

    fn traverse_into<'a>(&'a self, out: &mut Vec<&'a T>) {
        if let BinaryTree::Node { value, left, right } = self {
            right.traverse_into(out);
            out.push(value);
            left.traverse_into(out);
        }
    }
}

impl<T: Clone> BinaryTree<T> {
    /// Drops every node deeper than `depth`. A depth of zero yields the empty
    /// tree.
    pub fn truncate(&self, depth: usize) -> Self {
        match self {
            BinaryTree::Empty => BinaryTree::Empty,
            _ if depth == 0 => BinaryTree::Empty,
            BinaryTree::Node { value, left, right } => Self::node(
                value.clone(),
                left.truncate(depth - 1),
                right.truncate(depth - 1),
            ),
        }
    }
}
