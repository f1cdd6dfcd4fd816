use crate::config::{CoLossParameter, FillerParameter};
use crate::error::LossError;
use crate::layers::COLossLayer;
use approx::assert_relative_eq;
use ndarray::{arr1, arr2, Array1, Array2};


/// 센터를 직접 넣고 setup 까지 마친 레이어
pub fn layer_with_centers(centers: Array2<f32>, cutoff: f32, delta: f32, num_vec: usize) -> COLossLayer {
    let (k, d) = centers.dim();
    let mut layer = COLossLayer::new("coloss", CoLossParameter::new(k, cutoff, delta)).unwrap();
    layer.set_centers(centers).unwrap();
    layer.layer_setup(&[num_vec, d], &[num_vec]).unwrap();
    layer
}

pub fn sample_batch() -> (Array2<f32>, Array2<f32>, Array1<i64>) {
    let centers = arr2(&[
        [1.0f32, 0.2, 0.0, 0.1],
        [0.0, 1.0, 0.3, 0.0],
        [0.1, 0.0, 1.0, 0.5],
    ]);
    let features = arr2(&[
        [1.5f32, 0.5, -0.4, 0.2],
        [0.3, 1.4, 0.8, -0.6],
        [0.4, -0.3, 1.6, 0.9],
        [1.2, -0.5, 0.7, 0.4],
        [-0.6, 1.1, -0.2, 0.3],
    ]);
    (centers, features, arr1(&[0i64, 1, 2, 0, 1]))
}

#[test]
fn test_단위_센터_시나리오() {
    let mut layer = layer_with_centers(arr2(&[[1.0, 0.0], [0.0, 1.0]]), 0.0, 0.0, 2);
    let x = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
    let y = arr1(&[0i64, 1]);

    let out = layer.forward(&x.view(), &y.view()).unwrap();

    // 다른 클래스 유사도는 정확히 0 이므로 트리거 없음
    assert_relative_eq!(out.ortho_loss, 0.0);
    assert_relative_eq!(out.cluster_loss, 1.0);
    assert!(layer.trigger().iter().all(|&t| t == 0.0));
    assert_relative_eq!(*layer.inverse_similarity(), arr1(&[1.0f32, 1.0]));
}

#[test]
fn test_직교_손실_값() {
    let mut layer = layer_with_centers(arr2(&[[1.0, 0.0], [0.0, 1.0]]), 0.0, 1.0, 1);
    let x = arr2(&[[1.0f32, 2.0]]);
    let y = arr1(&[0i64]);

    let out = layer.forward(&x.view(), &y.view()).unwrap();

    assert_eq!(layer.trigger(), &arr2(&[[0.0f32, 1.0]]));
    assert_relative_eq!(out.ortho_loss, 1.0);
    assert_relative_eq!(out.cluster_loss, 0.5);
}

#[test]
fn test_sample_batch_losses() {
    let (centers, x, y) = sample_batch();
    let mut layer = layer_with_centers(centers, 0.0, 1.0, 5);
    let out = layer.forward(&x.view(), &y.view()).unwrap();

    assert_relative_eq!(out.cluster_loss, 0.408_315_5, epsilon = 1e-5);
    assert_relative_eq!(out.ortho_loss, 0.306, epsilon = 1e-5);
    assert_eq!(
        layer.trigger(),
        &arr2(&[
            [0.0f32, 1.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ])
    );
}

#[test]
fn test_자기_클래스는_트리거되지_않음() {
    // 모든 유사도가 양수여도 자기 클래스 칸은 0
    let mut layer = layer_with_centers(Array2::ones((4, 3)), 0.0, 1.0, 6);
    let x = Array2::from_elem((6, 3), 0.5f32);
    let y = arr1(&[0i64, 1, 2, 3, 0, 1]);

    let out = layer.forward(&x.view(), &y.view()).unwrap();

    for (i, &label) in y.iter().enumerate() {
        assert_eq!(layer.trigger()[[i, label as usize]], 0.0);
        assert_eq!(layer.trigger().row(i).sum(), 3.0);
    }
    assert!(out.ortho_loss >= 0.0);
    assert!(out.cluster_loss > 0.0);
}

#[test]
fn test_cutoff_하한() {
    let mut layer = layer_with_centers(arr2(&[[1.0, 0.0], [0.0, 1.0]]), 0.5, 1.0, 3);
    // 음수, cutoff 보다 작은 양수, cutoff 보다 큰 값
    let x = arr2(&[[-3.0f32, 0.0], [0.1, 0.0], [2.0, 0.0]]);
    let y = arr1(&[0i64, 0, 0]);

    layer.forward(&x.view(), &y.view()).unwrap();

    let r = layer.inverse_similarity();
    assert_eq!(r[0], 1.0 / 1.5);
    assert_eq!(r[1], 1.0 / 1.5);
    assert_relative_eq!(r[2], 1.0 / 3.0);
}

#[test]
fn test_warm_start_setup_twice_keeps_centers() {
    let param = CoLossParameter::new(3, 0.0, 1.0).with_filler(FillerParameter {
        filler_type: "uniform".into(),
        min: -1.0,
        max: 1.0,
        ..FillerParameter::default()
    });
    let mut layer = COLossLayer::new("coloss", param).unwrap();
    layer.layer_setup(&[4, 5], &[4]).unwrap();
    let before = layer.centers().unwrap().clone();

    layer.layer_setup(&[4, 5], &[4]).unwrap();
    assert_eq!(layer.centers().unwrap(), &before);

    // 배치 크기가 바뀌어도 센터는 그대로
    layer.layer_setup(&[7, 5], &[7]).unwrap();
    assert_eq!(layer.centers().unwrap(), &before);
    assert_eq!(layer.batch_size(), 7);
}

#[test]
fn test_setup_uses_imported_centers() {
    let mut layer = COLossLayer::new("coloss", CoLossParameter::new(2, 0.0, 1.0)).unwrap();
    let centers = arr2(&[[0.5f32, 0.5, 0.5], [1.0, 2.0, 3.0]]);
    layer.set_centers(centers.clone()).unwrap();
    layer.layer_setup(&[2, 3], &[2]).unwrap();
    assert_eq!(layer.centers().unwrap(), &centers);

    // 이미 들어 있는 센터와 D 가 다르면 실패
    let mut other = COLossLayer::new("coloss", CoLossParameter::new(2, 0.0, 1.0)).unwrap();
    other.set_centers(centers).unwrap();
    assert!(matches!(
        other.layer_setup(&[2, 4], &[2]),
        Err(LossError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_higher_rank_features_are_flattened() {
    let mut layer = COLossLayer::new("coloss", CoLossParameter::new(3, 0.0, 1.0)).unwrap();
    layer.layer_setup(&[2, 2, 3, 1], &[2, 1, 1, 1]).unwrap();
    assert_eq!(layer.dim(), 6);
    assert_eq!(layer.centers().unwrap().dim(), (3, 6));
    // 기본 필러는 0 상수
    assert!(layer.centers().unwrap().iter().all(|&v| v == 0.0));
}

#[test]
fn test_setup_shape_errors() {
    let mut layer = COLossLayer::new("coloss", CoLossParameter::new(3, 0.0, 1.0)).unwrap();
    assert!(matches!(layer.layer_setup(&[4], &[4]), Err(LossError::ShapeMismatch { .. })));
    assert!(matches!(layer.layer_setup(&[4, 2], &[3]), Err(LossError::ShapeMismatch { .. })));
    assert!(matches!(layer.layer_setup(&[4, 2], &[4, 2]), Err(LossError::ShapeMismatch { .. })));
    assert!(matches!(layer.layer_setup(&[4, 0], &[4]), Err(LossError::Configuration(_))));
    assert!(!layer.is_set_up());
}

#[test]
fn test_forward_errors() {
    let mut fresh = COLossLayer::new("coloss", CoLossParameter::new(2, 0.0, 1.0)).unwrap();
    let x = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
    assert!(matches!(
        fresh.forward(&x.view(), &arr1(&[0i64, 1]).view()),
        Err(LossError::NotSetUp(_))
    ));

    let mut layer = layer_with_centers(arr2(&[[1.0, 0.0], [0.0, 1.0]]), 0.0, 1.0, 2);
    assert!(matches!(
        layer.forward(&x.view(), &arr1(&[0i64, 2]).view()),
        Err(LossError::OutOfRangeLabel { index: 1, label: 2, num_output: 2 })
    ));
    assert!(matches!(
        layer.forward(&x.view(), &arr1(&[-1i64, 0]).view()),
        Err(LossError::OutOfRangeLabel { index: 0, label: -1, .. })
    ));
    assert!(matches!(
        layer.forward(&x.view(), &arr1(&[0i64]).view()),
        Err(LossError::ShapeMismatch { .. })
    ));
    let wide = Array2::<f32>::zeros((2, 3));
    assert!(matches!(
        layer.forward(&wide.view(), &arr1(&[0i64, 1]).view()),
        Err(LossError::ShapeMismatch { .. })
    ));
    let empty = Array2::<f32>::zeros((0, 2));
    assert!(matches!(
        layer.forward(&empty.view(), &Array1::<i64>::zeros(0).view()),
        Err(LossError::EmptyBatch)
    ));
}

#[test]
fn test_forward_reallocates_on_new_batch_size() {
    let mut layer = layer_with_centers(arr2(&[[1.0, 0.0], [0.0, 1.0]]), 0.0, 1.0, 2);
    let x = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
    layer.forward(&x.view(), &arr1(&[0i64, 1]).view()).unwrap();

    let x4 = arr2(&[[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 0.0]]);
    let out = layer.forward(&x4.view(), &arr1(&[0i64, 1, 0, 1]).view()).unwrap();
    assert_eq!(layer.batch_size(), 4);
    assert_eq!(layer.similarity().dim(), (4, 2));
    assert_eq!(layer.trigger().dim(), (4, 2));
    // R = [1/2, 1/2, 1/2, 1], 트리거는 [1,1] 과 [2,0] 행
    assert_relative_eq!(out.cluster_loss, 2.5 / 4.0);
    assert_relative_eq!(out.ortho_loss, (1.0 + 2.0) / 8.0);
}

#[test]
fn test_invalid_configuration() {
    assert!(matches!(
        COLossLayer::new("coloss", CoLossParameter::new(0, 0.0, 1.0)),
        Err(LossError::Configuration(_))
    ));
    let bad_filler = CoLossParameter::new(2, 0.0, 1.0).with_filler(FillerParameter {
        filler_type: "nope".into(),
        ..FillerParameter::default()
    });
    assert!(matches!(
        COLossLayer::new("coloss", bad_filler),
        Err(LossError::Configuration(_))
    ));
}
