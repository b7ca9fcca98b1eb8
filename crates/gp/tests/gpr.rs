use approx::assert_abs_diff_eq;
use gpry_gp::kernels::{ConstantKernel, LengthScaleKernel};
use gpry_gp::{
    AppendOptions, FitOptions, GaussianProcessRegressor, GpError, GprParams, InfThreshold,
    Kernel, NearestNeighborClassifier, NormalizeBounds, NormalizeY, PredictOptions, ScaledKernel,
};
use ndarray::{array, Array1, Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn const_rbf() -> ScaledKernel<f64> {
    ScaledKernel::new(
        ConstantKernel::new(1., (1e-3, 1e4)).unwrap(),
        LengthScaleKernel::rbf(array![1.]).unwrap(),
    )
}

fn with_std() -> PredictOptions {
    PredictOptions {
        return_std: true,
        ..Default::default()
    }
}

fn log_gaussian(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| -0.5 * row.mapv(|v| v * v).sum())
}

#[test]
fn test_fit_three_points() {
    init_logger();
    let params = GprParams::with_kernel(const_rbf())
        .noise_level(0.01)
        .random_state(Some(0));
    let mut gpr = GaussianProcessRegressor::new(params).unwrap();
    gpr.fit(
        Some(array![[0.], [1.], [2.]].view()),
        Some(array![0., 1., 0.].view()),
        &FitOptions::default(),
    )
    .unwrap();
    assert_eq!(gpr.n(), 3);
    assert!(gpr.fitted());

    let near = gpr.predict(&array![[1.]], &with_std()).unwrap();
    let far = gpr.predict(&array![[10.]], &with_std()).unwrap();
    assert_abs_diff_eq!(near.mean[0], 1., epsilon = 0.2);
    assert!(near.std.unwrap()[0] < far.std.unwrap()[0]);
    assert_eq!(gpr.n_eval(), 2);
}

#[test]
fn test_classifier_cutoff() {
    init_logger();
    let params = GprParams::with_kernel(const_rbf())
        .infinities_classifier(NearestNeighborClassifier::new())
        .inf_threshold(Some(InfThreshold::Absolute(5.)))
        .random_state(Some(0));
    let mut gpr = GaussianProcessRegressor::new(params).unwrap();
    gpr.fit(
        Some(array![[0.], [1.], [2.], [3.]].view()),
        Some(array![0., 1., -100., 2.].view()),
        &FitOptions::default(),
    )
    .unwrap();
    assert_eq!(gpr.n(), 3);
    assert_eq!(gpr.n_total(), 4);
    assert_eq!(gpr.x_train_infinite(), array![[2.]]);
    assert_eq!(gpr.x_train().unwrap(), &array![[0.], [1.], [3.]]);

    let pred = gpr.predict(&array![[2.], [0.5]], &with_std()).unwrap();
    assert_eq!(pred.mean[0], f64::NEG_INFINITY);
    assert_eq!(pred.std.as_ref().unwrap()[0], 0.);
    assert!(pred.mean[1].is_finite());
    assert!(pred.std.unwrap()[1] > 0.);
    assert_eq!(gpr.predict_std(&array![[2.]]).unwrap(), array![0.]);
}

#[test]
fn test_argument_validation() {
    let mut gpr = GaussianProcessRegressor::new(GprParams::with_kernel(const_rbf())).unwrap();
    assert!(matches!(
        gpr.fit(Some(array![[0.]].view()), None, &FitOptions::default()),
        Err(GpError::ArgumentError(_))
    ));
    let opts = PredictOptions {
        return_std: false,
        return_mean_grad: true,
        return_std_grad: true,
    };
    assert!(matches!(
        gpr.predict(&array![[0.]], &opts),
        Err(GpError::ArgumentError(_))
    ));
    assert!(matches!(
        gpr.fit(
            Some(array![[0.], [1.]].view()),
            Some(array![0.].view()),
            &FitOptions::default()
        ),
        Err(GpError::ArgumentError(_))
    ));
    assert!(matches!(
        gpr.append_to_data(
            &Array2::<f64>::zeros((0, 1)),
            &Array1::zeros(0),
            &AppendOptions::default()
        ),
        Err(GpError::ArgumentError(_))
    ));
}

#[test]
fn test_configuration_errors() {
    assert!(matches!(
        GaussianProcessRegressor::new(GprParams::<f64>::new()),
        Err(GpError::ConfigurationError(_))
    ));
    assert!(matches!(
        GaussianProcessRegressor::new(
            GprParams::new()
                .bounds(array![[0., 1.]])
                .infinities_classifier(NearestNeighborClassifier::new())
                .inf_threshold(None)
        ),
        Err(GpError::ConfigurationError(_))
    ));
    assert!("abc".parse::<InfThreshold<f64>>().is_err());
}

#[test]
fn test_sigma_threshold_resolution() {
    let gpr = GaussianProcessRegressor::new(
        GprParams::new()
            .bounds(array![[-5., 5.], [-5., 5.]])
            .infinities_classifier(NearestNeighborClassifier::new())
            .inf_threshold(Some("20s".parse().unwrap())),
    )
    .unwrap();
    let expected = gpry_gp::compute_threshold_given_sigma(20., 2);
    assert_abs_diff_eq!(gpr.diff_threshold().unwrap(), expected, epsilon = 1e-10);
    assert!(expected > 20.);
}

#[test]
fn test_refit_is_idempotent() {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let xt = Array2::from_shape_fn((12, 2), |_| rng.gen_range(-3.0..3.0));
    let yt = log_gaussian(&xt);
    let xtest = array![[0.3, -0.2], [1.5, 2.]];

    let params = GprParams::new()
        .bounds(array![[-3., 3.], [-3., 3.]])
        .random_state(Some(7));
    let mut gpr = GaussianProcessRegressor::new(params.clone()).unwrap();
    gpr.fit(Some(xt.view()), Some(yt.view()), &FitOptions::default())
        .unwrap();
    let theta = gpr.fitted_kernel().theta();
    let opts = FitOptions {
        n_restarts: Some(0),
        ..Default::default()
    };
    gpr.fit(None, None, &opts).unwrap();
    assert_eq!(gpr.n(), 12);
    let theta_refit = gpr.fitted_kernel().theta();
    let fact_refit = gpr.factorization().unwrap().clone();
    assert_abs_diff_eq!(theta_refit, theta, epsilon = 1e-4);

    // restarting from the optimum leaves the model unchanged
    gpr.fit(None, None, &opts).unwrap();
    assert_abs_diff_eq!(gpr.fitted_kernel().theta(), theta_refit, epsilon = 1e-10);
    let fact = gpr.factorization().unwrap();
    assert_abs_diff_eq!(fact.alpha, fact_refit.alpha, epsilon = 1e-10);
    assert_abs_diff_eq!(fact.v, fact_refit.v, epsilon = 1e-10);

    // with fixed hyperparameters refitting changes nothing
    let kernel = gpr.fitted_kernel().clone();
    let mut fixed = GaussianProcessRegressor::new(params.kernel(kernel).optimizer(None)).unwrap();
    fixed
        .fit(Some(xt.view()), Some(yt.view()), &FitOptions::default())
        .unwrap();
    let pred = fixed.predict(&xtest, &with_std()).unwrap();
    fixed.fit(None, None, &FitOptions::default()).unwrap();
    let pred_refit = fixed.predict(&xtest, &with_std()).unwrap();
    assert_eq!(pred, pred_refit);
    assert_eq!(fixed.n_eval_loglike(), 2);
}

#[test]
fn test_append_matches_fit_with_fixed_hyperparameters() {
    let mut rng = Xoshiro256Plus::seed_from_u64(3);
    let xt = Array2::from_shape_fn((10, 2), |_| rng.gen_range(-3.0..3.0));
    let yt = log_gaussian(&xt);
    let params = GprParams::new()
        .bounds(array![[-3., 3.], [-3., 3.]])
        .preprocessing_x(NormalizeBounds::new(&array![[-3., 3.], [-3., 3.]]).unwrap())
        .random_state(Some(0));

    let mut gpr = GaussianProcessRegressor::new(params.clone()).unwrap();
    gpr.fit(
        Some(xt.slice(ndarray::s![..6, ..])),
        Some(yt.slice(ndarray::s![..6])),
        &FitOptions::default(),
    )
    .unwrap();
    let kernel = gpr.fitted_kernel().clone();
    gpr.append_to_data(
        &xt.slice(ndarray::s![6.., ..]),
        &yt.slice(ndarray::s![6..]),
        &AppendOptions {
            fit: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(gpr.n(), 10);
    assert_eq!(gpr.fitted_kernel(), &kernel);

    let mut full = GaussianProcessRegressor::new(params.kernel(kernel).optimizer(None)).unwrap();
    full.fit(Some(xt.view()), Some(yt.view()), &FitOptions::default())
        .unwrap();

    let xtest = array![[0., 0.], [-1., 2.5], [2., -2.]];
    let pred = gpr.predict(&xtest, &with_std()).unwrap();
    let pred_full = full.predict(&xtest, &with_std()).unwrap();
    assert_abs_diff_eq!(pred.mean, pred_full.mean, epsilon = 1e-8);
    assert_abs_diff_eq!(pred.std.unwrap(), pred_full.std.unwrap(), epsilon = 1e-8);
}

#[test]
fn test_append_with_fit_matches_fit() {
    let mut rng = Xoshiro256Plus::seed_from_u64(5);
    let xt = Array2::from_shape_fn((12, 2), |_| rng.gen_range(-3.0..3.0));
    let yt = log_gaussian(&xt);
    let params = GprParams::new()
        .bounds(array![[-3., 3.], [-3., 3.]])
        .n_restarts(3)
        .random_state(Some(21));

    let mut gpr = GaussianProcessRegressor::new(params.clone()).unwrap();
    for chunk in [0..6, 6..12] {
        gpr.append_to_data(
            &xt.slice(ndarray::s![chunk.clone(), ..]),
            &yt.slice(ndarray::s![chunk]),
            &AppendOptions::default(),
        )
        .unwrap();
    }
    let mut full = GaussianProcessRegressor::new(params).unwrap();
    full.fit(Some(xt.view()), Some(yt.view()), &FitOptions::default())
        .unwrap();

    assert_eq!(gpr.x_train(), full.x_train());
    assert_eq!(gpr.transformed_y_train(), full.transformed_y_train());
    assert_eq!(gpr.factorization().unwrap().n(), 12);
    assert_abs_diff_eq!(
        gpr.fitted_kernel().theta(),
        full.fitted_kernel().theta(),
        epsilon = 1e-3
    );
    let xtest = array![[0., 0.], [-1., 2.5], [2., -2.]];
    let pred = gpr.predict(&xtest, &with_std()).unwrap();
    let pred_full = full.predict(&xtest, &with_std()).unwrap();
    assert_abs_diff_eq!(pred.mean, pred_full.mean, epsilon = 1e-3);
    assert_abs_diff_eq!(pred.std.unwrap(), pred_full.std.unwrap(), epsilon = 1e-3);
}

#[test]
fn test_finite_points_kept_when_maximum_increases() {
    let params = GprParams::with_kernel(const_rbf())
        .optimizer(None)
        .infinities_classifier(NearestNeighborClassifier::new())
        .inf_threshold(Some(InfThreshold::Absolute(5.)));
    let mut gpr = GaussianProcessRegressor::new(params).unwrap();
    let xt = array![[0.], [1.], [2.]];
    let yt = array![0., -3., -1.];
    gpr.fit(Some(xt.view()), Some(yt.view()), &FitOptions::default())
        .unwrap();
    assert_eq!(gpr.n(), 3);
    assert_eq!(gpr.x_train_infinite().nrows(), 0);

    gpr.append_to_data(
        &array![[3.]],
        &array![10.],
        &AppendOptions {
            fit: false,
            ..Default::default()
        },
    )
    .unwrap();
    // earlier points now fall below the threshold but stay in the training set
    assert_eq!(gpr.n(), 4);
    assert_eq!(gpr.x_train_infinite(), xt);
    assert_eq!(gpr.y_train_infinite(), yt);
    assert_eq!(gpr.is_finite(&yt), array![false, false, false]);
    assert_eq!(gpr.factorization().unwrap().n(), 4);
}

#[test]
fn test_prior_prediction_without_data() {
    let gpr = GaussianProcessRegressor::new(
        GprParams::new()
            .bounds(array![[0., 1.]])
            .preprocessing_y(NormalizeY::new()),
    )
    .unwrap();
    assert!(!gpr.fitted());
    assert_eq!(gpr.n(), 0);
    assert_eq!(gpr.y_max(), f64::NEG_INFINITY);
    let opts = PredictOptions {
        return_std: true,
        return_mean_grad: true,
        return_std_grad: true,
    };
    let pred = gpr.predict(&array![[0.5]], &opts).unwrap();
    assert_eq!(pred.mean, array![0.]);
    assert_abs_diff_eq!(pred.std.unwrap(), array![1.]);
    assert_eq!(pred.mean_grad.unwrap(), array![[0.]]);
    assert_eq!(pred.std_grad.unwrap(), array![[0.]]);
}

#[test]
fn test_variances_are_non_negative() {
    // nearly duplicated points with a tiny noise stress the variance computation
    let params = GprParams::with_kernel(const_rbf())
        .noise_level(1e-5)
        .optimizer(None);
    let mut gpr = GaussianProcessRegressor::new(params).unwrap();
    let xt = array![[0.], [1e-4], [0.5], [0.5 + 1e-4], [1.]];
    let yt = array![0., 0., 0.25, 0.25, 1.];
    gpr.fit(Some(xt.view()), Some(yt.view()), &FitOptions::default())
        .unwrap();
    let xtest = Array2::from_shape_fn((21, 1), |(i, _)| i as f64 * 0.05);
    let std = gpr.predict_std(&xtest).unwrap();
    assert!(std.iter().all(|s| s.is_finite() && *s >= 0.));
    let std = gpr.predict_std(&xt).unwrap();
    assert!(std.iter().all(|s| *s >= 0. && *s < 1e-2));
}

#[test]
fn test_active_learning_loop() {
    init_logger();
    let bounds = array![[-4., 4.], [-4., 4.]];
    let params = GprParams::new()
        .bounds(bounds.clone())
        .preprocessing_x(NormalizeBounds::new(&bounds).unwrap())
        .preprocessing_y(NormalizeY::new())
        .infinities_classifier(NearestNeighborClassifier::new())
        .inf_threshold(Some(InfThreshold::Absolute(6.)))
        .random_state(Some(1));
    let mut gpr = GaussianProcessRegressor::new(params).unwrap();
    let mut rng = Xoshiro256Plus::seed_from_u64(11);

    let x0 = Array2::from_shape_fn((5, 2), |_| rng.gen_range(-1.0..1.0));
    gpr.append_to_data(&x0, &log_gaussian(&x0), &AppendOptions::default())
        .unwrap();
    assert_eq!(gpr.n(), 5);

    for i in 0..4 {
        let x = Array2::from_shape_fn((3, 2), |_| rng.gen_range(-4.0..4.0));
        let y = log_gaussian(&x);
        let opts = AppendOptions {
            fit: i % 2 == 0,
            simplified_fit: true,
            ..Default::default()
        };
        gpr.append_to_data(&x, &y, &opts).unwrap();
        let (x_last, y_last) = gpr.last_appended();
        assert_eq!(x_last, x);
        assert_eq!(y_last, y);
        assert!(gpr.last_appended_finite().1.iter().all(|v| *v >= gpr.abs_threshold_finite()));
    }
    assert_eq!(gpr.n_total(), 17);
    assert_eq!(gpr.y_train_all().unwrap().len(), 17);
    assert_eq!(gpr.newly_appended_for_inv(), 0);
    assert_eq!(gpr.factorization().unwrap().n(), gpr.n());

    let pred = gpr
        .predict(
            &array![[0.1, -0.1]],
            &PredictOptions {
                return_std: true,
                return_mean_grad: true,
                return_std_grad: true,
            },
        )
        .unwrap();
    assert!(pred.mean[0].is_finite());
    assert!(pred.mean_grad.unwrap().iter().all(|g| g.is_finite()));
}
