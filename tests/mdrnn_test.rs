#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::Tensor;
    use mdgru::cells::GruCell;
    use mdgru::rnn::MdRnn;

    type Backend = NdArray<f32>;

    fn voxel(output: &Tensor<Backend, 5>, i: usize, j: usize) -> Tensor<Backend, 5> {
        output.clone().slice([0..1, i..i + 1, j..j + 1, 0..1])
    }

    #[test]
    fn test_gru_cell_state_stays_bounded() {
        let device = Default::default();
        let cell = GruCell::<Backend>::new(3, 5, &device);

        let mut state = Tensor::<Backend, 2>::zeros([2, 5], &device);
        for _ in 0..20 {
            let input = Tensor::<Backend, 2>::random(
                [2, 3],
                burn::tensor::Distribution::Uniform(-5.0, 5.0),
                &device,
            );
            state = cell.forward(input, state);
        }

        assert_eq!(state.dims(), [2, 5]);
        assert!(state.abs().max().into_scalar() <= 1.0);
    }

    #[test]
    fn test_context_flows_along_lines() {
        let device = Default::default();
        let rnn = MdRnn::<Backend>::new(1, 4, 2, &device);

        let base = Tensor::<Backend, 5>::zeros([1, 4, 4, 1, 1], &device);
        let mut bumped = vec![0.0f32; 16];
        bumped[0] = 3.0; // voxel (0, 0)
        let bumped = Tensor::<Backend, 5>::from_data(
            burn::tensor::TensorData::new(bumped, [1, 4, 4, 1, 1]),
            &device,
        );

        let a = rnn.forward(base);
        let b = rnn.forward(bumped);

        // same row and same column see the change
        let row = (voxel(&a, 0, 3) - voxel(&b, 0, 3)).abs().sum().into_scalar();
        let column = (voxel(&a, 3, 0) - voxel(&b, 3, 0)).abs().sum().into_scalar();
        assert!(row > 0.0);
        assert!(column > 0.0);

        // a single layer does not reach voxels off both lines
        let diagonal = (voxel(&a, 3, 3) - voxel(&b, 3, 3)).abs().sum().into_scalar();
        assert!(diagonal < 1e-7);
    }

    #[test]
    fn test_strided_layers_keep_length() {
        let device = Default::default();

        for (length, stride) in [(7, 2), (6, 2), (5, 3), (4, 4), (3, 5)] {
            let rnn = MdRnn::<Backend>::new(2, 3, 1, &device).with_strides(vec![stride]);
            let input = Tensor::<Backend, 5>::zeros([1, length, 1, 1, 2], &device);

            assert_eq!(
                rnn.forward(input).dims(),
                [1, length, 1, 1, 3],
                "length {} stride {}",
                length,
                stride
            );
        }
    }
}
