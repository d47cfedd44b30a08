use super::*;

// PBRT-style bounding volume hierarchy over the scene's shape soup. The
// builder takes ownership of the shape list and reorders it so leaves
// address contiguous runs.

const BUCKET_COUNT: usize = 12;
const MAX_SHAPES_PER_LEAF: usize = 4;
const TRAVERSAL_STACK_SIZE: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SplitMethod {
    Sah,
    Middle,
    EqualCounts,
}

impl Default for SplitMethod {
    fn default() -> Self {
        Self::Sah
    }
}

//
// Linear node
//

// 32-byte packed record. `offset` is the first shape index for leaves
// (num_shapes > 0) and the second child index for interior nodes; the
// first child always sits at the node's own index + 1.

#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Default, Debug)]
pub struct LinearNode {
    pub bounds_min: Point3,
    pub bounds_max: Point3,
    pub offset: u32,
    pub num_shapes: u16,
    pub split_axis: u8,
    pub pad: u8,
}

const _: () = assert!(std::mem::size_of::<LinearNode>() == 32);

impl LinearNode {
    #[inline]
    fn aabb(&self) -> Aabb {
        Aabb::from_min_max(&self.bounds_min, &self.bounds_max)
    }
}

//
// BVH
//

#[derive(Debug)]
pub struct Bvh {
    nodes: Vec<LinearNode>,
    shapes: Vec<Shape>,
}

impl Bvh {
    pub fn build(shapes: Vec<Shape>, meshes: &[MeshInstance], split_method: SplitMethod) -> Self {
        assert!(!shapes.is_empty(), "BVH needs at least one shape");

        let mut build_infos = shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| {
                let aabb = shape.world_space_aabb(meshes);
                BuildShapeInfo {
                    index,
                    centroid: aabb.centroid(),
                    aabb,
                }
            })
            .collect::<Vec<_>>();

        let mut build_nodes = Vec::new();
        let mut ordered = Vec::with_capacity(shapes.len());
        build_recursive(
            &mut build_infos,
            &mut build_nodes,
            &mut ordered,
            split_method,
        );

        let mut nodes = Vec::with_capacity(build_nodes.len());
        flatten(&build_nodes, 0, &mut nodes);
        debug_assert_eq!(nodes.len(), build_nodes.len());

        // Reorder the shape list into traversal order.
        let mut slots = shapes.into_iter().map(Some).collect::<Vec<_>>();
        let shapes = ordered
            .into_iter()
            .map(|index| slots[index].take().expect("shape emitted twice"))
            .collect();

        Self { nodes, shapes }
    }

    pub fn root_aabb(&self) -> Aabb {
        self.nodes[0].aabb()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    // Closest-hit query. Returns true iff `hit.t` decreased.
    pub fn intersect(&self, meshes: &[MeshInstance], ray: &Ray, hit: &mut IntersectionData) -> bool {
        let aabb_test = RayAabbIntersector::new(ray);
        let original_t = hit.t;

        let mut todo = [0_usize; TRAVERSAL_STACK_SIZE];
        let mut todo_offset = 0;
        let mut node_index = 0;

        loop {
            let node = &self.nodes[node_index];
            if aabb_test.hit(ray, &node.aabb(), hit.t) {
                if node.num_shapes > 0 {
                    let first = node.offset as usize;
                    for shape in &self.shapes[first..first + node.num_shapes as usize] {
                        shape.intersect(meshes, ray, hit);
                    }
                    if todo_offset == 0 {
                        break;
                    }
                    todo_offset -= 1;
                    node_index = todo[todo_offset];
                } else {
                    // Front-to-back: descend the child on the ray's side
                    // first so closer hits shrink `hit.t` sooner.
                    debug_assert!(todo_offset < TRAVERSAL_STACK_SIZE);
                    if aabb_test.dir_neg(node.split_axis as usize) {
                        todo[todo_offset] = node_index + 1;
                        todo_offset += 1;
                        node_index = node.offset as usize;
                    } else {
                        todo[todo_offset] = node.offset as usize;
                        todo_offset += 1;
                        node_index += 1;
                    }
                }
            } else {
                if todo_offset == 0 {
                    break;
                }
                todo_offset -= 1;
                node_index = todo[todo_offset];
            }
        }

        hit.t < original_t
    }

    // Any-hit query for shadow rays; short-circuits on the first
    // intersection within `t_max`.
    pub fn occluded(&self, meshes: &[MeshInstance], ray: &Ray, t_max: f32) -> bool {
        let aabb_test = RayAabbIntersector::new(ray);

        let mut todo = [0_usize; TRAVERSAL_STACK_SIZE];
        let mut todo_offset = 0;
        let mut node_index = 0;

        loop {
            let node = &self.nodes[node_index];
            if aabb_test.hit(ray, &node.aabb(), t_max) {
                if node.num_shapes > 0 {
                    let first = node.offset as usize;
                    for shape in &self.shapes[first..first + node.num_shapes as usize] {
                        if shape.test_if_hit(meshes, ray, t_max) {
                            return true;
                        }
                    }
                    if todo_offset == 0 {
                        break;
                    }
                    todo_offset -= 1;
                    node_index = todo[todo_offset];
                } else {
                    debug_assert!(todo_offset < TRAVERSAL_STACK_SIZE);
                    if aabb_test.dir_neg(node.split_axis as usize) {
                        todo[todo_offset] = node_index + 1;
                        todo_offset += 1;
                        node_index = node.offset as usize;
                    } else {
                        todo[todo_offset] = node.offset as usize;
                        todo_offset += 1;
                        node_index += 1;
                    }
                }
            } else {
                if todo_offset == 0 {
                    break;
                }
                todo_offset -= 1;
                node_index = todo[todo_offset];
            }
        }

        false
    }
}

//
// Build
//

struct BuildShapeInfo {
    index: usize,
    centroid: Point3,
    aabb: Aabb,
}

#[derive(Clone, Copy, Debug)]
struct BuildNode {
    aabb: Aabb,
    children: Option<[usize; 2]>,
    split_axis: Option<usize>,
    first_shape_offset: Option<usize>,
    num_shapes: Option<usize>,
}

impl Default for BuildNode {
    fn default() -> Self {
        Self {
            aabb: Aabb::new(),
            children: None,
            split_axis: None,
            first_shape_offset: None,
            num_shapes: None,
        }
    }
}

impl BuildNode {
    fn set_leaf(&mut self, first_shape_offset: usize, num_shapes: usize, aabb: Aabb) {
        assert!(self.aabb.is_empty());
        assert!(self.children.is_none());
        self.aabb = aabb;
        self.first_shape_offset = Some(first_shape_offset);
        self.num_shapes = Some(num_shapes);
    }

    fn set_interior(&mut self, split_axis: usize, children: [usize; 2], aabb: Aabb) {
        assert!(self.aabb.is_empty());
        assert!(self.first_shape_offset.is_none());
        self.aabb = aabb;
        self.children = Some(children);
        self.split_axis = Some(split_axis);
    }
}

fn build_recursive(
    infos: &mut [BuildShapeInfo],
    build_nodes: &mut Vec<BuildNode>,
    ordered: &mut Vec<usize>,
    split_method: SplitMethod,
) -> usize {
    assert!(!infos.is_empty());

    build_nodes.push(BuildNode::default());
    let curr = build_nodes.len() - 1;

    let bounds = infos
        .iter()
        .fold(Aabb::new(), |bounds, info| bounds.merged(&info.aabb));

    let num_shapes = infos.len();
    if num_shapes == 1 {
        emit_leaf(&mut build_nodes[curr], infos, ordered, bounds);
        return curr;
    }

    let centroid_bounds = Aabb::from_points(infos.iter().map(|info| &info.centroid));
    let dim = centroid_bounds.longest_dimension();

    // All centroids coincide along the split axis; no partition can make
    // progress.
    if centroid_bounds.max()[dim] == centroid_bounds.min()[dim] {
        emit_leaf(&mut build_nodes[curr], infos, ordered, bounds);
        return curr;
    }

    let split = match split_method {
        SplitMethod::Middle => {
            let mid = 0.5 * (centroid_bounds.min()[dim] + centroid_bounds.max()[dim]);
            let split = itertools::partition(infos.iter_mut(), |info| info.centroid[dim] < mid);
            if split == 0 || split == num_shapes {
                split_equal_counts(infos, dim)
            } else {
                split
            }
        }
        SplitMethod::EqualCounts => split_equal_counts(infos, dim),
        SplitMethod::Sah => {
            if num_shapes <= MAX_SHAPES_PER_LEAF {
                split_equal_counts(infos, dim)
            } else {
                match split_sah(infos, dim, &bounds, &centroid_bounds) {
                    Some(split) => split,
                    None => {
                        emit_leaf(&mut build_nodes[curr], infos, ordered, bounds);
                        return curr;
                    }
                }
            }
        }
    };

    let left = build_recursive(&mut infos[..split], build_nodes, ordered, split_method);
    let right = build_recursive(&mut infos[split..], build_nodes, ordered, split_method);
    let children_bounds = build_nodes[left].aabb.merged(&build_nodes[right].aabb);
    build_nodes[curr].set_interior(dim, [left, right], children_bounds);

    curr
}

fn emit_leaf(
    node: &mut BuildNode,
    infos: &[BuildShapeInfo],
    ordered: &mut Vec<usize>,
    bounds: Aabb,
) {
    node.set_leaf(ordered.len(), infos.len(), bounds);
    ordered.extend(infos.iter().map(|info| info.index));
}

// Median split via introselect.
fn split_equal_counts(infos: &mut [BuildShapeInfo], dim: usize) -> usize {
    let mid = infos.len() / 2;
    infos.select_nth_unstable_by(mid, |a, b| {
        a.centroid[dim]
            .partial_cmp(&b.centroid[dim])
            .expect("unable to compare centroids")
    });
    mid
}

// Binned surface-area heuristic. Returns the partition point, or None
// when keeping the node as a leaf is estimated cheaper.
fn split_sah(
    infos: &mut [BuildShapeInfo],
    dim: usize,
    bounds: &Aabb,
    centroid_bounds: &Aabb,
) -> Option<usize> {
    #[derive(Clone, Copy)]
    struct Bucket {
        count: usize,
        aabb: Aabb,
    }

    impl Default for Bucket {
        fn default() -> Self {
            Self {
                count: 0,
                aabb: Aabb::new(),
            }
        }
    }

    let find_bucket = |info: &BuildShapeInfo| -> usize {
        let offset = centroid_bounds.offset(&info.centroid)[dim];
        ((BUCKET_COUNT as f32 * offset) as usize).min(BUCKET_COUNT - 1)
    };

    let mut buckets = [Bucket::default(); BUCKET_COUNT];
    for info in infos.iter() {
        let bucket = &mut buckets[find_bucket(info)];
        bucket.count += 1;
        bucket.aabb.merge(&info.aabb);
    }

    // Estimated traversal cost for each of the candidate splits.
    let bounds_area = bounds.surface_area();
    let mut costs = [0.0_f32; BUCKET_COUNT - 1];
    for (i, cost) in costs.iter_mut().enumerate() {
        let left = buckets[..=i]
            .iter()
            .fold((0, Aabb::new()), |(count, aabb), bucket| {
                (count + bucket.count, aabb.merged(&bucket.aabb))
            });
        let right = buckets[(i + 1)..]
            .iter()
            .fold((0, Aabb::new()), |(count, aabb), bucket| {
                (count + bucket.count, aabb.merged(&bucket.aabb))
            });
        *cost = 0.5
            + (left.0 as f32 * left.1.surface_area() + right.0 as f32 * right.1.surface_area())
                / bounds_area;
    }

    // Equal costs keep the lower bucket index.
    let mut min_cost = costs[0];
    let mut min_cost_bucket = 0;
    for (i, &cost) in costs.iter().enumerate().skip(1) {
        if cost < min_cost {
            min_cost = cost;
            min_cost_bucket = i;
        }
    }

    let leaf_cost = infos.len() as f32;
    if infos.len() > MAX_SHAPES_PER_LEAF || min_cost < leaf_cost {
        Some(itertools::partition(infos.iter_mut(), |info| {
            find_bucket(info) <= min_cost_bucket
        }))
    } else {
        None
    }
}

//
// Flatten
//

fn flatten(build_nodes: &[BuildNode], parent: usize, nodes: &mut Vec<LinearNode>) -> usize {
    let curr = nodes.len();
    nodes.push(LinearNode::default());

    let build_node = &build_nodes[parent];
    nodes[curr].bounds_min = build_node.aabb.min();
    nodes[curr].bounds_max = build_node.aabb.max();

    if let Some(num_shapes) = build_node.num_shapes {
        nodes[curr].offset = build_node.first_shape_offset.expect("invalid BuildNode") as u32;
        nodes[curr].num_shapes = num_shapes as u16;
    } else {
        nodes[curr].split_axis = build_node.split_axis.expect("invalid BuildNode") as u8;
        let children = build_node.children.expect("invalid BuildNode");
        flatten(build_nodes, children[0], nodes);
        nodes[curr].offset = flatten(build_nodes, children[1], nodes) as u32;
    }

    curr
}

//
// Tests
//
