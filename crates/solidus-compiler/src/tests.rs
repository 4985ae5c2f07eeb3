//! Integration tests for solidus-compiler.

#[cfg(test)]
mod integration_tests {
    use solidus_domain::Interval;
    use solidus_expr::{DeduplicationCache, Elementary, ExprArena, ExprHandle};
    use solidus_matrix::Matrix;

    use crate::{
        compile, compile_jacobian, evaluate, evaluate_jacobian, evaluate_parallel, EvalError,
        EvaluationContext, Kernel, MatrixId, Operation, ParallelConfig, Source,
    };

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-10 * (1.0 + expected.abs());
        assert!((actual - expected).abs() < tolerance, "{actual} vs {expected}");
    }

    /// A 5-component function of two parameters exercising vector kernels.
    fn surface(arena: &mut ExprArena) -> ExprHandle {
        let u = arena.parameter(0, 2).unwrap();
        let v = arena.parameter(1, 2).unwrap();
        let basis = Matrix::from_rows(&[vec![1.0, 0.5], vec![0.0, 2.0], vec![-1.0, 1.0]]);
        let a = arena.linear(&basis, &[0.5, -0.25, 1.0]).unwrap();

        let su = arena.sin(u).unwrap();
        let cv = arena.cos(v).unwrap();
        let uv = arena.product(u, v).unwrap();
        let head = arena.concatenate(su, cv).unwrap();
        let b = arena.concatenate(head, uv).unwrap();

        let c = arena.cross(a, b).unwrap();
        let n = arena.normalized(c);
        let sb = arena.squared_norm(b);
        let denominator = arena.add_scalar(sb, 1.0).unwrap();
        let q = arena.quotient(n, denominator).unwrap();
        let d = arena.dot(a, b).unwrap();
        let na = arena.norm(a);
        let base = arena.add_scalar(na, 1.0).unwrap();
        let r = arena.pow(base, u).unwrap();

        let tail = arena.concatenate(d, r).unwrap();
        arena.concatenate(q, tail).unwrap()
    }

    const POINTS: [[f64; 2]; 3] = [[0.3, 0.7], [-1.2, 0.4], [2.0, -0.9]];

    fn point_batch() -> Matrix<f64> {
        Matrix::from_columns(&POINTS.iter().map(|p| p.to_vec()).collect::<Vec<_>>())
    }

    #[test]
    fn test_shared_subexpression_computed_once() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let square = arena.product(s, s).unwrap();
        let f = arena.sum(s, square).unwrap();

        let sequence = compile::<f64>(&arena, f);
        assert_eq!(sequence.count_kernel(&Kernel::Elementary(Elementary::Sine)), 1);
        assert_eq!(sequence.count_kernel(&Kernel::PowerInteger(2)), 1);

        let values = sequence.evaluate(&Matrix::from_rows(&[vec![0.3, -1.1]])).unwrap();
        for (j, t) in [0.3f64, -1.1].into_iter().enumerate() {
            assert_close(values[(0, j)], t.sin() + t.sin() * t.sin());
        }
    }

    #[test]
    fn test_component_view_needs_no_allocation() {
        let mut arena = ExprArena::new();
        let x = arena.identity(3).unwrap();
        let yz = arena.components(x, 1, 2).unwrap();

        let sequence = compile::<f64>(&arena, yz);
        assert_eq!(sequence.allocation_count(), 0);
        assert_eq!(
            sequence.operations(),
            &[Operation::Assign {
                source: MatrixId::parameters().block(1, 2),
                target: MatrixId::result(),
            }]
        );

        let points = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        let values = sequence.evaluate(&points).unwrap();
        assert_eq!(values, Matrix::from_rows(&[vec![3.0, 4.0], vec![5.0, 6.0]]));
    }

    /// Asserts that `id` refers to a buffer that is live at this point.
    fn assert_live(id: MatrixId, live: &[u32], heap: &[u32]) {
        if let Source::Slot(slot) = id.source() {
            assert!(
                slot == 0 || live.contains(&slot) || heap.contains(&slot),
                "m{slot} used while not allocated"
            );
        }
    }

    #[test]
    fn test_stack_releases_are_lifo() {
        let mut arena = ExprArena::new();
        let f = surface(&mut arena);
        for sequence in [compile::<f64>(&arena, f), compile_jacobian::<f64>(&arena, f)] {
            let mut live = Vec::new();
            let mut heap = Vec::new();
            let mut released = 0;
            for op in sequence.operations() {
                match op {
                    Operation::StackAllocate { slot, .. } => {
                        assert!(!live.contains(slot) && !heap.contains(slot));
                        live.push(*slot);
                    }
                    Operation::HeapAllocate { slot, .. } => {
                        assert!(!live.contains(slot) && !heap.contains(slot));
                        heap.push(*slot);
                    }
                    Operation::StackDeallocate { slots } => {
                        for slot in slots {
                            assert_eq!(live.pop(), Some(*slot));
                            released += 1;
                        }
                    }
                    Operation::Assign { source, target } => {
                        assert_live(*source, &live, &heap);
                        assert_live(*target, &live, &heap);
                    }
                    Operation::Compute {
                        arguments, target, ..
                    } => {
                        for &argument in arguments {
                            assert_live(argument, &live, &heap);
                        }
                        assert_live(*target, &live, &heap);
                    }
                }
            }
            assert!(live.is_empty());
            assert!(released > 0);
            assert!(sequence.budget().temporaries >= heap.len());
        }
    }

    #[test]
    fn test_concatenated_operand_shared_with_sibling() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let e = arena.exp(s).unwrap();
        let f = arena.concatenate(s, e).unwrap();

        let values = compile::<f64>(&arena, f);
        assert_eq!(values.count_kernel(&Kernel::Elementary(Elementary::Sine)), 1);
        assert_eq!(values.count_kernel(&Kernel::Elementary(Elementary::Exponential)), 1);
        let jacobian = compile_jacobian::<f64>(&arena, f);
        assert_eq!(jacobian.count_kernel(&Kernel::ElementaryDerivative(Elementary::Sine)), 1);
        assert_eq!(jacobian.count_kernel(&Kernel::Elementary(Elementary::Sine)), 1);

        let t = 0.6f64;
        let point = Matrix::from_column_slice(1, 1, &[t]);
        let value = values.evaluate(&point).unwrap();
        assert_close(value[(0, 0)], t.sin());
        assert_close(value[(1, 0)], t.sin().exp());
        let slope = jacobian.evaluate(&point).unwrap();
        assert_close(slope[(0, 0)], t.cos());
        assert_close(slope[(1, 0)], t.sin().exp() * t.cos());
    }

    #[test]
    fn test_unshared_operands_write_in_place() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let c = arena.cos(t).unwrap();
        let f = arena.concatenate(s, c).unwrap();

        let sequence = compile::<f64>(&arena, f);
        assert_eq!(sequence.allocation_count(), 0);
        assert_eq!(
            sequence.operations()[0],
            Operation::Compute {
                kernel: Kernel::Elementary(Elementary::Sine),
                arguments: [MatrixId::parameters().block(0, 1)].into_iter().collect(),
                target: MatrixId::result().block(0, 1),
            }
        );
    }

    #[test]
    fn test_values_match_point_evaluation() {
        let mut arena = ExprArena::new();
        let f = surface(&mut arena);
        let values = evaluate(&arena, f, &point_batch()).unwrap();
        assert_eq!((values.rows(), values.columns()), (5, POINTS.len()));
        for (j, point) in POINTS.iter().enumerate() {
            let expected = arena.evaluate_point(f, point);
            for (i, &e) in expected.iter().enumerate() {
                assert_close(values[(i, j)], e);
            }
        }
    }

    #[test]
    fn test_jacobian_matches_symbolic_derivative() {
        let mut arena = ExprArena::new();
        let f = surface(&mut arena);
        let jacobian = evaluate_jacobian(&arena, f, &point_batch()).unwrap();
        assert_eq!((jacobian.rows(), jacobian.columns()), (10, POINTS.len()));

        let partials = [arena.derivative(f, 0).unwrap(), arena.derivative(f, 1).unwrap()];
        for (j, point) in POINTS.iter().enumerate() {
            for (p, &partial) in partials.iter().enumerate() {
                let expected = arena.evaluate_point(partial, point);
                for (i, &e) in expected.iter().enumerate() {
                    assert_close(jacobian[(p * 5 + i, j)], e);
                }
            }
        }
    }

    #[test]
    fn test_jacobian_layout() {
        let mut arena = ExprArena::new();
        let u = arena.parameter(0, 2).unwrap();
        let v = arena.parameter(1, 2).unwrap();
        let uv = arena.product(u, v).unwrap();
        let sum = arena.sum(u, v).unwrap();
        let su = arena.sin(u).unwrap();
        let head = arena.concatenate(uv, sum).unwrap();
        let f = arena.concatenate(head, su).unwrap();

        let point = Matrix::from_column_slice(2, 1, &[2.0, 3.0]);
        let jacobian = evaluate_jacobian(&arena, f, &point).unwrap();
        let expected = [3.0, 1.0, 2.0f64.cos(), 2.0, 1.0, 0.0];
        for (i, &e) in expected.iter().enumerate() {
            assert_close(jacobian[(i, 0)], e);
        }
    }

    #[test]
    fn test_chain_rule() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let two_t = arena.scaled(t, 2.0);
        let s = arena.sin(two_t).unwrap();
        let f = arena.exp(s).unwrap();

        let t = 0.7f64;
        let jacobian = evaluate_jacobian(&arena, f, &Matrix::from_column_slice(1, 1, &[t])).unwrap();
        assert_close(jacobian[(0, 0)], (2.0 * t).sin().exp() * (2.0 * t).cos() * 2.0);
    }

    #[test]
    fn test_composition() {
        let mut arena = ExprArena::new();
        let x = arena.identity(2).unwrap();
        let outer = arena.squared_norm(x);
        let t = arena.parameter(0, 1).unwrap();
        let c = arena.cos(t).unwrap();
        let wide = arena.scaled(c, 2.0);
        let s = arena.sin(t).unwrap();
        let inner = arena.concatenate(wide, s).unwrap();
        let f = arena.compose(outer, inner).unwrap();

        let t = 0.4f64;
        let point = Matrix::from_column_slice(1, 1, &[t]);
        let value = evaluate(&arena, f, &point).unwrap();
        assert_close(value[(0, 0)], 4.0 * t.cos().powi(2) + t.sin().powi(2));
        let jacobian = evaluate_jacobian(&arena, f, &point).unwrap();
        assert_close(jacobian[(0, 0)], -6.0 * t.sin() * t.cos());
    }

    #[test]
    fn test_elliptical_circle() {
        let mut arena = ExprArena::new();
        let circle = arena
            .elliptical(&Matrix::identity(2), &[1.0, -1.0], &[true])
            .unwrap();

        let ts = [0.0, 0.5, 2.5];
        let points = Matrix::from_rows(&[ts.to_vec()]);
        let values = evaluate(&arena, circle, &points).unwrap();
        let jacobian = evaluate_jacobian(&arena, circle, &points).unwrap();
        for (j, &t) in ts.iter().enumerate() {
            assert_close(values[(0, j)], 1.0 + t.cos());
            assert_close(values[(1, j)], -1.0 + t.sin());
            assert_close(jacobian[(0, j)], -t.sin());
            assert_close(jacobian[(1, j)], t.cos());
        }
    }

    #[test]
    fn test_interval_square_contains_range() {
        let mut arena = ExprArena::new();
        let p = arena.parameter(0, 1).unwrap();
        let square = arena.product(p, p).unwrap();

        let sequence = compile::<Interval>(&arena, square);
        let box_ = Matrix::from_column_slice(1, 1, &[Interval::new(-1.0, 2.0)]);
        let bounds = sequence.evaluate(&box_).unwrap()[(0, 0)];
        assert!(bounds.contains(0.0));
        assert!(bounds.contains(4.0));
        assert!(bounds.lower() <= 0.0 && bounds.lower() > -1e-12);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let mut arena = ExprArena::new();
        let f = surface(&mut arena);
        let first = compile_jacobian::<f64>(&arena, f);
        let second = compile_jacobian::<f64>(&arena, f);
        assert_eq!(first.operations(), second.operations());
        assert_eq!(first.budget(), second.budget());
        assert_eq!(first.constants(), second.constants());
    }

    #[test]
    fn test_deduplication_enables_sharing() {
        let mut arena = ExprArena::new();
        let t1 = arena.parameter(0, 1).unwrap();
        let t2 = arena.parameter(0, 1).unwrap();
        let s1 = arena.sin(t1).unwrap();
        let s2 = arena.sin(t2).unwrap();
        let f = arena.sum(s1, s2).unwrap();

        let sine = Kernel::Elementary(Elementary::Sine);
        assert_eq!(compile::<f64>(&arena, f).count_kernel(&sine), 2);

        let mut cache = DeduplicationCache::new();
        let g = arena.deduplicated(f, &mut cache);
        let sequence = compile::<f64>(&arena, g);
        assert_eq!(sequence.count_kernel(&sine), 1);
        let values = sequence.evaluate(&Matrix::from_rows(&[vec![0.25]])).unwrap();
        assert_close(values[(0, 0)], 2.0 * 0.25f64.sin());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut arena = ExprArena::new();
        let f = surface(&mut arena);
        let sequence = compile::<f64>(&arena, f);

        #[allow(clippy::cast_precision_loss)]
        let columns: Vec<Vec<f64>> = (0..50)
            .map(|j| vec![0.1 * j as f64 - 2.0, 0.05 * j as f64])
            .collect();
        let points = Matrix::from_columns(&columns);
        let config = ParallelConfig {
            parallel_threshold: 8,
            chunk_columns: 7,
        };
        let parallel = evaluate_parallel(&sequence, &points, &config).unwrap();
        assert_eq!(parallel, sequence.evaluate(&points).unwrap());
    }

    #[test]
    fn test_parameter_errors() {
        let mut arena = ExprArena::new();
        let f = surface(&mut arena);
        let sequence = compile::<f64>(&arena, f);
        assert_eq!(
            sequence.evaluate(&Matrix::zeros(3, 1)),
            Err(EvalError::ParameterCountMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(sequence.evaluate(&Matrix::zeros(2, 0)), Err(EvalError::EmptyBatch));

        let jacobian = compile_jacobian::<f64>(&arena, f);
        let points = Matrix::zeros(2, 2);
        assert_eq!(
            EvaluationContext::new(&jacobian, &points).err(),
            Some(EvalError::JacobianBatch { columns: 2 })
        );
    }

    #[test]
    fn test_context_exposes_heap_values() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let c = arena.cos(t).unwrap();
        let f = arena.sum(s, c).unwrap();

        let sequence = compile::<f64>(&arena, f);
        let points = Matrix::from_rows(&[vec![0.1, 0.2, 0.3]]);
        let mut context = EvaluationContext::new(&sequence, &points).unwrap();
        assert_eq!(context.batch_size(), 3);
        context.execute();

        let sines = context.view(MatrixId::slot(1));
        for (j, t) in [0.1f64, 0.2, 0.3].into_iter().enumerate() {
            assert_close(sines.get(0, j), t.sin());
            assert_close(context.result()[(0, j)], t.sin() + t.cos());
        }
    }

    #[test]
    fn test_constant_root() {
        let mut arena = ExprArena::new();
        let k = arena.constant(&[1.5, -2.0], 1).unwrap();
        let points = Matrix::from_rows(&[vec![0.0, 1.0]]);
        let values = evaluate(&arena, k, &points).unwrap();
        assert_eq!(values, Matrix::from_rows(&[vec![1.5, 1.5], vec![-2.0, -2.0]]));
        let jacobian = evaluate_jacobian(&arena, k, &points).unwrap();
        assert!(jacobian.is_zero());
    }
}
